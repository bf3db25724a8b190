//! Core audio types and structures

/// Planar audio buffer and channel types
pub mod audio;
/// Progress reporting
pub mod progress;
/// Segments, speaker stems and override regions
pub mod segment;

pub use audio::{AudioBuffer, BitDepth, Channels};
pub use progress::{LogSink, NoopSink, ProgressSink, Step};
pub use segment::{GenderLabel, Region, Segment, SpeakerStem};
