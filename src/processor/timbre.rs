//! Classifier segmentation refined by smoothing and a timbre double-check.

use super::smoothing::{double_check, smooth_isolated};
use crate::analysis::FormantExtractor;
use crate::classify::score_segment;
use crate::config::PipelineConfig;
use crate::core::segment::fill_coverage;
use crate::core::{AudioBuffer, ProgressSink, Segment, Step};
use crate::error::AudioResult;
use crate::models::GenderSegmenter;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct TimbreOutcome {
    pub segments: Vec<Segment>,
    /// Blips relabelled by isolation smoothing
    pub smoothed: usize,
    /// Male segments the double-check turned female
    pub rejected: usize,
}

/// Segment `audio` (stored at `audio_path`) with the external classifier
pub fn segment_by_timbre(
    audio: &AudioBuffer,
    audio_path: &Path,
    segmenter: &dyn GenderSegmenter,
    formants: &dyn FormantExtractor,
    config: &PipelineConfig,
    sink: &dyn ProgressSink,
) -> AudioResult<TimbreOutcome> {
    sink.report(Step::Analyze, "Running gender segmentation");
    let raw = segmenter.segment(audio_path)?;
    let raw_count = raw.len();
    let mut segments = fill_coverage(raw, audio.duration_secs());
    log::debug!(
        "segmenter returned {} segments, {} after coverage repair",
        raw_count,
        segments.len()
    );

    let smoothed = smooth_isolated(&mut segments, config.isolation_min_secs);
    if smoothed > 0 {
        sink.report(Step::Analyze, &format!("Smoothed {} isolated segments", smoothed));
    }

    sink.report(Step::Analyze, "Double-checking male segments");
    let mono = audio.to_mono();
    let rejected = double_check(
        &mut segments,
        &mono,
        audio.sample_rate(),
        config,
        |slice, sr| score_segment(slice, sr, config.segment_score_threshold, Some(formants)),
    );
    if rejected > 0 {
        sink.report(
            Step::Analyze,
            &format!("{} male segments re-judged female", rejected),
        );
    }

    Ok(TimbreOutcome {
        segments,
        smoothed,
        rejected,
    })
}
