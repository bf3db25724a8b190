//! Manual override: shift caller-chosen regions, no classification involved.

use super::compositor::{self, CompositeOutcome, CompositeStats, Compositor};
use crate::core::{AudioBuffer, Region};
use crate::error::AudioResult;
use crate::filter::PitchShift;

/// Shift each region of `source` by its own amount (or `default_semitones`).
///
/// Regions are validated up front and applied in start order. Overlapping
/// regions compound, since each one reads the working buffer. A region that
/// starts past the end of the audio is skipped; one that runs past it is
/// clamped.
pub fn apply_regions(
    source: &AudioBuffer,
    regions: &[Region],
    default_semitones: f64,
    compositor: &Compositor,
) -> AudioResult<CompositeOutcome> {
    for region in regions {
        region.validate()?;
    }

    let mut ordered = regions.to_vec();
    ordered.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut audio = source.clone();
    let mut stats = CompositeStats::default();
    let total = audio.frames();
    let sr = audio.sample_rate() as f64;

    for region in &ordered {
        let start = (region.start * sr).round() as usize;
        if start >= total {
            log::warn!(
                "region {:.2}s-{:.2}s starts after the audio ends ({:.2}s), skipped",
                region.start,
                region.end,
                audio.duration_secs()
            );
            continue;
        }
        let end = audio.seconds_to_frame(region.end);
        if end <= start {
            stats.skipped_short += 1;
            continue;
        }

        let semitones = region.semitones.unwrap_or(default_semitones);
        let shifter = PitchShift::new(semitones)?;
        log::debug!(
            "region {:.2}s-{:.2}s: {:+.1} semitones",
            region.start,
            region.end,
            semitones
        );
        compositor.shift_span(&mut audio, start, end, &shifter);
        stats.shifted_spans += 1;
    }

    stats.clip_gain = compositor::finish(&mut audio);
    Ok(CompositeOutcome { audio, stats })
}
