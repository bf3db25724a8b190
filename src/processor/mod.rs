//! Segmentation strategies, post-processing and compositing

pub mod compositor;
pub mod regions;
pub mod segment;
pub mod separation;
pub mod simple;
pub mod smoothing;
pub mod timbre;

pub use compositor::{CompositeOutcome, CompositeStats, Compositor};
pub use regions::apply_regions;
pub use segment::{FixedWindows, Span};
pub use separation::{MixTarget, SpeakerSummary};

use crate::config::Strategy;
use crate::core::segment::label_seconds;
use crate::core::{GenderLabel, Segment};
use serde::Serialize;

/// Summary of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingReport {
    pub strategy: Option<Strategy>,
    pub male_segments: usize,
    pub female_segments: usize,
    pub silent_segments: usize,
    pub unknown_segments: usize,
    pub male_secs: f64,
    pub female_secs: f64,
    /// Isolated blips relabelled by smoothing
    pub smoothed: usize,
    /// Male segments the timbre double-check overrode
    pub double_check_rejections: usize,
    /// Threshold per adaptive window (one entry when not adaptive)
    pub thresholds_hz: Vec<f32>,
    pub speakers: Vec<SpeakerSummary>,
    pub shifted_spans: usize,
    pub clip_gain: Option<f32>,
}

impl ProcessingReport {
    pub fn new(strategy: Option<Strategy>) -> Self {
        ProcessingReport {
            strategy,
            male_segments: 0,
            female_segments: 0,
            silent_segments: 0,
            unknown_segments: 0,
            male_secs: 0.0,
            female_secs: 0.0,
            smoothed: 0,
            double_check_rejections: 0,
            thresholds_hz: Vec::new(),
            speakers: Vec::new(),
            shifted_spans: 0,
            clip_gain: None,
        }
    }

    /// Fill the segment counters
    pub fn count_segments(&mut self, segments: &[Segment]) {
        let count = |label: GenderLabel| segments.iter().filter(|s| s.label == label).count();
        self.male_segments = count(GenderLabel::Male);
        self.female_segments = count(GenderLabel::Female);
        self.silent_segments = count(GenderLabel::NoEnergy);
        self.unknown_segments = segments.len() - self.male_segments - self.female_segments - self.silent_segments;
        self.male_secs = label_seconds(segments, GenderLabel::Male);
        self.female_secs = label_seconds(segments, GenderLabel::Female);
    }

    pub fn record_composite(&mut self, stats: &CompositeStats) {
        self.shifted_spans = stats.shifted_spans;
        self.clip_gain = stats.clip_gain;
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        if !self.speakers.is_empty() {
            let male = self.speakers.iter().filter(|s| s.is_male).count();
            return format!(
                "{} of {} speakers shifted",
                male,
                self.speakers.len()
            );
        }
        format!(
            "{} male segments ({:.1}s), {} female ({:.1}s), {} silent, {} unknown",
            self.male_segments,
            self.male_secs,
            self.female_segments,
            self.female_secs,
            self.silent_segments,
            self.unknown_segments
        )
    }
}
