//! Fixed-window pitch segmentation.
//!
//! Two passes: the first estimates one pitch per window and collects the
//! population of each threshold window, the second classifies every window
//! against its threshold.

use super::segment::FixedWindows;
use crate::analysis::estimate_pitch;
use crate::classify::{WindowThresholds, is_male};
use crate::config::PipelineConfig;
use crate::core::{AudioBuffer, GenderLabel, ProgressSink, Segment, Step};
use crate::error::{AudioError, AudioResult};
use std::time::Duration;

/// Segments are reported to the progress sink in batches of this size
const PROGRESS_EVERY: usize = 20;

#[derive(Debug, Clone)]
pub struct SimpleOutcome {
    pub segments: Vec<Segment>,
    pub thresholds: WindowThresholds,
}

/// Label fixed-length windows of `audio` by pitch
pub fn segment_by_pitch(
    audio: &AudioBuffer,
    config: &PipelineConfig,
    sink: &dyn ProgressSink,
) -> AudioResult<SimpleOutcome> {
    let sr = audio.sample_rate();
    let duration = Duration::try_from_secs_f64(config.segment_duration_secs)
        .map_err(|e| AudioError::ConfigError(format!("segment duration: {}", e)))?;
    let windows = FixedWindows::new(duration, sr)?;

    let mono = audio.to_mono();
    let spans = windows.spans(mono.len());
    let count = spans.len();

    // Pass 1: None marks a silent window
    let mut pitches: Vec<Option<f32>> = Vec::with_capacity(count);
    for span in &spans {
        let slice = &mono[span.start..span.end];
        let peak = slice.iter().fold(0.0f32, |a, &b| a.max(b.abs()));
        pitches.push((peak >= config.silence_peak).then(|| estimate_pitch(slice, sr)));

        if (span.index + 1) % PROGRESS_EVERY == 0 {
            sink.report(
                Step::Pitch,
                &format!("Analyzing segment {}/{}", span.index + 1, count),
            );
        }
    }

    let observations: Vec<(usize, f32)> = spans
        .iter()
        .zip(&pitches)
        .filter_map(|(span, pitch)| pitch.map(|p| (span.start, p)))
        .collect();
    let thresholds = WindowThresholds::compute(
        &observations,
        config.male_threshold_hz,
        config.adaptive_window_secs,
        mono.len(),
        sr,
    );
    if thresholds.is_adaptive() {
        for (i, t) in thresholds.thresholds().iter().enumerate() {
            log::info!("threshold window {}: {:.1} Hz", i, t);
        }
    }

    // Pass 2
    let segments: Vec<Segment> = spans
        .iter()
        .zip(&pitches)
        .map(|(span, pitch)| {
            let label = match *pitch {
                None => GenderLabel::NoEnergy,
                Some(p) if p <= 0.0 => GenderLabel::Unknown,
                Some(p) if is_male(p, thresholds.for_sample(span.start)) => GenderLabel::Male,
                Some(_) => GenderLabel::Female,
            };
            span.to_segment(label, sr)
        })
        .collect();

    log::debug!("simple segmentation: {} windows", segments.len());
    Ok(SimpleOutcome {
        segments,
        thresholds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NoopSink;
    use crate::core::segment::check_coverage;
    use std::cell::Cell;
    use std::f32::consts::PI;

    fn tone(freq: f32, secs: f32, sr: u32) -> Vec<f32> {
        (0..(secs * sr as f32) as usize)
            .map(|i| (2.0 * PI * freq * i as f32 / sr as f32).sin() * 0.3)
            .collect()
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            male_threshold_hz: 165.0,
            segment_duration_secs: 0.5,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_low_and_high_voices() {
        let sr = 16000;
        let mut samples = tone(110.0, 2.0, sr);
        samples.extend(tone(220.0, 2.0, sr));
        let audio = AudioBuffer::mono(samples, sr).unwrap();

        let outcome = segment_by_pitch(&audio, &config(), &NoopSink).unwrap();
        assert_eq!(outcome.segments.len(), 8);
        assert!(check_coverage(&outcome.segments, 4.0).is_ok());
        for seg in &outcome.segments[..4] {
            assert_eq!(seg.label, GenderLabel::Male);
        }
        for seg in &outcome.segments[4..] {
            assert_eq!(seg.label, GenderLabel::Female);
        }
    }

    #[test]
    fn test_silence_is_no_energy() {
        let sr = 16000;
        let mut samples = vec![0.001f32; sr as usize];
        samples.extend(tone(110.0, 1.0, sr));
        let audio = AudioBuffer::mono(samples, sr).unwrap();

        let outcome = segment_by_pitch(&audio, &config(), &NoopSink).unwrap();
        assert_eq!(outcome.segments[0].label, GenderLabel::NoEnergy);
        assert_eq!(outcome.segments[1].label, GenderLabel::NoEnergy);
        assert_eq!(outcome.segments[2].label, GenderLabel::Male);
    }

    #[test]
    fn test_coverage_with_partial_tail() {
        let sr = 8000;
        let audio = AudioBuffer::mono(tone(120.0, 1.3, sr), sr).unwrap();
        let outcome = segment_by_pitch(&audio, &config(), &NoopSink).unwrap();
        assert_eq!(outcome.segments.len(), 3);
        assert!(check_coverage(&outcome.segments, audio.duration_secs()).is_ok());
    }

    #[test]
    fn test_progress_is_reported() {
        let sr = 8000;
        let audio = AudioBuffer::mono(vec![0.0; sr as usize * 21], sr).unwrap();
        let calls = Cell::new(0);
        let sink = |step: Step, _: &str| {
            assert_eq!(step, Step::Pitch);
            calls.set(calls.get() + 1);
        };
        segment_by_pitch(&audio, &config(), &sink).unwrap();
        // 42 windows
        assert_eq!(calls.get(), 2);
    }
}
