//! Selective pitch-shift compositor.
//!
//! The output starts as a copy of the source. Each male span is read from the
//! working buffer, shifted, crossfaded against what it replaces, and written
//! back to the same samples, so the output always has the source's length.

use crate::config::{PipelineConfig, Strategy};
use crate::core::{AudioBuffer, GenderLabel, Segment};
use crate::error::AudioResult;
use crate::filter::{Normalize, PitchShift};
use serde::Serialize;

/// Result of one compositing pass
#[derive(Debug, Clone)]
pub struct CompositeOutcome {
    pub audio: AudioBuffer,
    pub stats: CompositeStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompositeStats {
    /// Spans that were pitch-shifted
    pub shifted_spans: usize,
    /// Male spans left alone because they were too short
    pub skipped_short: usize,
    /// Gain of the clip guard, when it had to scale the output
    pub clip_gain: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct Compositor {
    crossfade_secs: f64,
    min_shift_secs: f64,
}

impl Compositor {
    pub fn new(crossfade_secs: f64, min_shift_secs: f64) -> Self {
        Compositor {
            crossfade_secs: crossfade_secs.max(0.0),
            min_shift_secs: min_shift_secs.max(0.0),
        }
    }

    /// Compositor for the segments of `config.strategy`.
    ///
    /// Only timbre segments carry the short-span floor; pitch windows and
    /// manual regions are always shifted.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let min_shift = match config.strategy {
            Strategy::Timbre => config.min_shift_secs,
            _ => 0.0,
        };
        Self::new(config.crossfade_secs(), min_shift)
    }

    /// Compositor without a short-span floor
    pub fn unfloored(config: &PipelineConfig) -> Self {
        Self::new(config.crossfade_secs(), 0.0)
    }

    /// Shift every male segment of `source` by `semitones`.
    ///
    /// Segments are visited in time order; non-male segments are copied
    /// through untouched.
    pub fn apply(
        &self,
        source: &AudioBuffer,
        segments: &[Segment],
        semitones: f64,
    ) -> AudioResult<CompositeOutcome> {
        let shifter = PitchShift::new(semitones)?;
        let mut audio = source.clone();
        let mut stats = CompositeStats::default();
        let min_len = (self.min_shift_secs * source.sample_rate() as f64) as usize;

        let mut ordered: Vec<&Segment> = segments
            .iter()
            .filter(|s| s.label == GenderLabel::Male)
            .collect();
        ordered.sort_by(|a, b| a.start.total_cmp(&b.start));

        for segment in ordered {
            let start = audio.seconds_to_frame(segment.start);
            let end = audio.seconds_to_frame(segment.end);
            if end <= start || end - start < min_len {
                stats.skipped_short += 1;
                continue;
            }
            self.shift_span(&mut audio, start, end, &shifter);
            stats.shifted_spans += 1;
        }

        stats.clip_gain = finish(&mut audio);
        log::debug!(
            "compositor: {} spans shifted, {} too short",
            stats.shifted_spans,
            stats.skipped_short
        );
        Ok(CompositeOutcome { audio, stats })
    }

    /// Replace `[start, end)` of every channel with its shifted version.
    ///
    /// The first and last `min(crossfade, span / 4)` samples are blended
    /// linearly with the samples being replaced, except at the buffer edges.
    pub fn shift_span(&self, audio: &mut AudioBuffer, start: usize, end: usize, shifter: &PitchShift) {
        let total = audio.frames();
        let end = end.min(total);
        if end <= start {
            return;
        }

        let span = end - start;
        let fade = ((self.crossfade_secs * audio.sample_rate() as f64) as usize).min(span / 4);
        let ramp = linear_ramp(fade);

        for ch in 0..audio.channel_count() {
            let original = &audio.channel(ch)[start..end];
            let mut shifted = shifter.shift(original);
            shifted.resize(span, 0.0);

            if start > 0 {
                for (i, &w) in ramp.iter().enumerate() {
                    shifted[i] = original[i] * (1.0 - w) + shifted[i] * w;
                }
            }
            if end < total {
                let tail = span - fade;
                for (i, &w) in ramp.iter().enumerate() {
                    shifted[tail + i] = shifted[tail + i] * (1.0 - w) + original[tail + i] * w;
                }
            }

            audio.channel_mut(ch)[start..end].copy_from_slice(&shifted);
        }
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Run the clip guard over a finished composite
pub(crate) fn finish(audio: &mut AudioBuffer) -> Option<f32> {
    let gain = Normalize::clip_guard().apply(audio);
    if let Some(g) = gain {
        log::info!("clip guard: peak above full scale, scaled by {:.4}", g);
    }
    gain
}

/// `n` weights from 0 to 1 inclusive
fn linear_ramp(n: usize) -> Vec<f32> {
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..n).map(|i| i as f32 / (n - 1) as f32).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone(freq: f32, secs: f32, sr: u32, amp: f32) -> Vec<f32> {
        (0..(secs * sr as f32) as usize)
            .map(|i| (2.0 * PI * freq * i as f32 / sr as f32).sin() * amp)
            .collect()
    }

    #[test]
    fn test_linear_ramp() {
        assert!(linear_ramp(0).is_empty());
        assert_eq!(linear_ramp(1), vec![0.0]);
        assert_eq!(linear_ramp(3), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_length_invariance() {
        let source = AudioBuffer::new(
            vec![tone(130.0, 1.3, 8000, 0.4), tone(180.0, 1.3, 8000, 0.2)],
            8000,
        )
        .unwrap();
        let segments = vec![
            Segment::new(GenderLabel::Male, 0.0, 0.37),
            Segment::new(GenderLabel::Female, 0.37, 0.8),
            Segment::new(GenderLabel::Male, 0.8, 1.3),
        ];

        for semitones in [-7.0, -3.0, 4.0] {
            let outcome = Compositor::new(0.02, 0.1).apply(&source, &segments, semitones).unwrap();
            assert_eq!(outcome.audio.frames(), source.frames());
            assert_eq!(outcome.audio.channel_count(), 2);
            assert_eq!(outcome.stats.shifted_spans, 2);
        }
    }

    #[test]
    fn test_no_male_segments_is_identity() {
        let source = AudioBuffer::mono(tone(200.0, 1.0, 8000, 0.5), 8000).unwrap();
        let segments = vec![
            Segment::new(GenderLabel::Female, 0.0, 0.5),
            Segment::new(GenderLabel::Unknown, 0.5, 1.0),
        ];
        let outcome = Compositor::default().apply(&source, &segments, -3.0).unwrap();
        assert_eq!(outcome.audio, source);
        assert_eq!(outcome.stats.shifted_spans, 0);
    }

    #[test]
    fn test_zero_shift_is_identity() {
        let source = AudioBuffer::mono(tone(110.0, 1.0, 8000, 0.5), 8000).unwrap();
        let segments = vec![Segment::new(GenderLabel::Male, 0.25, 0.75)];
        let outcome = Compositor::default().apply(&source, &segments, 0.0).unwrap();
        for (a, b) in outcome.audio.channel(0).iter().zip(source.channel(0)) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_untouched_outside_male_span() {
        let sr = 8000;
        let source = AudioBuffer::mono(tone(120.0, 2.0, sr, 0.5), sr).unwrap();
        let segments = vec![
            Segment::new(GenderLabel::Female, 0.0, 0.5),
            Segment::new(GenderLabel::Male, 0.5, 1.5),
            Segment::new(GenderLabel::Female, 1.5, 2.0),
        ];
        let outcome = Compositor::new(0.02, 0.1).apply(&source, &segments, -5.0).unwrap();
        let out = outcome.audio.channel(0);
        let src = source.channel(0);

        assert_eq!(&out[..4000], &src[..4000]);
        assert_eq!(&out[12000..], &src[12000..]);
        // Crossfade starts from the original sample
        assert_eq!(out[4000], src[4000]);
        assert!(out[5000..11000].iter().zip(&src[5000..11000]).any(|(a, b)| (a - b).abs() > 1e-3));
    }

    #[test]
    fn test_short_span_is_skipped() {
        let source = AudioBuffer::mono(tone(120.0, 1.0, 8000, 0.5), 8000).unwrap();
        let segments = vec![Segment::new(GenderLabel::Male, 0.5, 0.55)];
        let outcome = Compositor::new(0.02, 0.1).apply(&source, &segments, -3.0).unwrap();
        assert_eq!(outcome.stats.skipped_short, 1);
        assert_eq!(outcome.audio, source);
    }

    #[test]
    fn test_clip_guard() {
        let source = AudioBuffer::mono(tone(100.0, 1.0, 8000, 1.4), 8000).unwrap();
        let segments = vec![Segment::new(GenderLabel::Female, 0.0, 1.0)];
        let outcome = Compositor::default().apply(&source, &segments, -3.0).unwrap();
        assert!(outcome.audio.peak() <= 1.0);
        assert!(outcome.stats.clip_gain.is_some());

        let quiet = AudioBuffer::mono(tone(100.0, 1.0, 8000, 0.5), 8000).unwrap();
        let outcome = Compositor::default().apply(&quiet, &segments, -3.0).unwrap();
        assert_eq!(outcome.stats.clip_gain, None);
    }

    #[test]
    fn test_floor_applies_to_timbre_only() {
        let source = AudioBuffer::mono(tone(120.0, 1.0, 8000, 0.5), 8000).unwrap();
        let segments = vec![Segment::new(GenderLabel::Male, 0.5, 0.55)];

        let timbre = PipelineConfig {
            strategy: Strategy::Timbre,
            ..PipelineConfig::default()
        };
        let outcome = Compositor::from_config(&timbre).apply(&source, &segments, -3.0).unwrap();
        assert_eq!(outcome.stats.skipped_short, 1);

        for strategy in [Strategy::Simple, Strategy::Hybrid] {
            let config = PipelineConfig {
                strategy,
                ..PipelineConfig::default()
            };
            let outcome = Compositor::from_config(&config).apply(&source, &segments, -3.0).unwrap();
            assert_eq!(outcome.stats.shifted_spans, 1);
            assert_eq!(outcome.stats.skipped_short, 0);
        }

        let outcome = Compositor::unfloored(&timbre).apply(&source, &segments, -3.0).unwrap();
        assert_eq!(outcome.stats.shifted_spans, 1);
    }
}
