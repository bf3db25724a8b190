//! # voxshift: selective pitch lowering for male speech
//!
//! Decides, for every slice of a recording, whether it is male speech,
//! female speech or neither, and lowers the pitch of the male slices only.
//! Output audio always has exactly as many samples as the input.
//!
//! ## Strategies
//!
//! - **simple** - fixed windows classified by pitch against an adaptive threshold
//! - **timbre** - an external gender segmenter, smoothed and double-checked on timbre
//! - **separation** - speaker separation, speakers ranked by pitch
//! - **hybrid** - speaker separation, a speaker is male when both timbre and pitch agree
//!
//! ## Quick Start
//!
//! ```ignore
//! use voxshift::{ModelContext, NoopSink, Pipeline, PipelineConfig, Strategy};
//! use voxshift::media::Ffmpeg;
//!
//! let config = PipelineConfig {
//!     strategy: Strategy::Simple,
//!     ..PipelineConfig::default()
//! };
//! let pipeline = Pipeline::new(config, ModelContext::new())?;
//! let report = pipeline.process_video("in.mp4".as_ref(), "out.mp4".as_ref(), &Ffmpeg::locate()?, &NoopSink)?;
//! println!("{}", report.summary());
//! ```

/// Pitch and spectral feature extraction
pub mod analysis;
/// Gender decisions from pitch and timbre
pub mod classify;
/// Pipeline configuration
pub mod config;
/// Core audio types and structures
pub mod core;
/// Audio decoder implementations
pub mod decoder;
/// Audio encoder implementations
pub mod encoder;
/// Error types for audio operations
pub mod error;
/// Audio filter implementations
pub mod filter;
/// External media tool (extract / remux)
pub mod media;
/// External model seams
pub mod models;
/// End-to-end processing
pub mod pipeline;
/// Segmentation strategies and compositing
pub mod processor;

pub use config::{PipelineConfig, Strategy};
pub use core::{AudioBuffer, Channels, GenderLabel, LogSink, NoopSink, ProgressSink, Region, Segment, Step};
pub use error::{AudioError, AudioResult};
pub use models::ModelContext;
pub use pipeline::Pipeline;
pub use processor::ProcessingReport;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
