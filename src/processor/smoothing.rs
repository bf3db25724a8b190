//! Post-processing of classifier segments

use crate::classify::TimbreVerdict;
use crate::config::PipelineConfig;
use crate::core::{GenderLabel, Segment};

const SMOOTHING_PASSES: usize = 2;

/// Relabel short speech blips that sit between two neighbours agreeing on a
/// different speech label. Returns the number of relabelled segments.
///
/// Runs two in-place passes, so a relabel in the first pass is visible to
/// later decisions. Bounds are never changed.
pub fn smooth_isolated(segments: &mut [Segment], min_secs: f64) -> usize {
    if segments.len() <= 2 {
        return 0;
    }

    let mut relabelled = 0;
    for _ in 0..SMOOTHING_PASSES {
        for i in 1..segments.len() - 1 {
            let current = segments[i];
            if !current.label.is_speech() || current.duration() >= min_secs {
                continue;
            }

            let prev = segments[i - 1].label;
            let next = segments[i + 1].label;
            if prev == next && prev != current.label && prev.is_speech() {
                log::debug!(
                    "smoothing {:.2}s-{:.2}s: {} -> {}",
                    current.start,
                    current.end,
                    current.label,
                    prev
                );
                segments[i] = current.relabel(prev);
                relabelled += 1;
            }
        }
    }
    relabelled
}

/// Re-score long male segments on their own samples and flip those the
/// verifier confidently calls female. Returns the number of flipped segments.
pub fn double_check<F>(
    segments: &mut [Segment],
    mono: &[f32],
    sample_rate: u32,
    config: &PipelineConfig,
    verify: F,
) -> usize
where
    F: Fn(&[f32], u32) -> TimbreVerdict,
{
    let sr = sample_rate as f64;
    let mut rejected = 0;

    for segment in segments.iter_mut() {
        if segment.label != GenderLabel::Male || segment.duration() < config.double_check_min_secs {
            continue;
        }

        let start = ((segment.start * sr).round() as usize).min(mono.len());
        let end = ((segment.end * sr).round() as usize).min(mono.len());
        if end <= start {
            continue;
        }

        let verdict = verify(&mono[start..end], sample_rate);
        if !verdict.is_male() && verdict.confidence > config.double_check_confidence {
            log::info!(
                "double-check {:.2}s-{:.2}s: female (score {:.2}, confidence {:.2}), not shifting",
                segment.start,
                segment.end,
                verdict.score,
                verdict.confidence
            );
            *segment = segment.relabel(GenderLabel::Female);
            rejected += 1;
        }
    }
    rejected
}
