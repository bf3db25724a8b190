//! Pitch distribution of a whole recording, used to suggest a threshold and
//! a segment length before processing.

use super::pitch::{estimate_pitch, rms_frames};
use super::{mean, median};
use crate::core::{AudioBuffer, ProgressSink, Step};
use serde::Serialize;

pub const HIST_LOW_HZ: f32 = 50.0;
pub const HIST_HIGH_HZ: f32 = 350.0;
pub const DEFAULT_THRESHOLD_HZ: f32 = 165.0;
pub const DEFAULT_SEGMENT_SECS: f64 = 0.5;

/// Pitch histogram over [50, 350] Hz
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PitchHistogram {
    pub counts: Vec<usize>,
    pub centers: Vec<f32>,
}

impl PitchHistogram {
    pub fn new(pitches: &[f32], bins: usize) -> Self {
        let width = (HIST_HIGH_HZ - HIST_LOW_HZ) / bins as f32;
        let mut counts = vec![0usize; bins];
        for &p in pitches {
            if !(HIST_LOW_HZ..=HIST_HIGH_HZ).contains(&p) {
                continue;
            }
            // The top edge belongs to the last bin
            let idx = (((p - HIST_LOW_HZ) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }

        let centers = (0..bins)
            .map(|i| HIST_LOW_HZ + width * (i as f32 + 0.5))
            .collect();
        PitchHistogram { counts, centers }
    }

    /// Three-bin moving average, edges reflected
    pub fn smoothed(&self) -> Vec<f32> {
        let n = self.counts.len();
        let at = |i: isize| -> f32 {
            let idx = i.clamp(0, n as isize - 1) as usize;
            self.counts[idx] as f32
        };
        (0..n as isize)
            .map(|i| (at(i - 1) + at(i) + at(i + 1)) / 3.0)
            .collect()
    }

    /// Centre of the first smoothed bin between 120 and 200 Hz that is lower
    /// than both neighbours and below 70% of the mean smoothed count
    pub fn valley(&self) -> Option<f32> {
        let smoothed = self.smoothed();
        let limit = mean(&smoothed)? * 0.7;
        (1..smoothed.len().saturating_sub(1)).find_map(|j| {
            let center = self.centers[j];
            let is_valley = center > 120.0
                && center < 200.0
                && smoothed[j] < smoothed[j - 1]
                && smoothed[j] < smoothed[j + 1]
                && smoothed[j] < limit;
            is_valley.then_some(center)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PitchStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub median: f32,
}

impl PitchStats {
    fn of(pitches: &[f32]) -> Option<Self> {
        Some(PitchStats {
            min: pitches.iter().copied().fold(f32::INFINITY, f32::min),
            max: pitches.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            mean: mean(pitches)?,
            median: median(pitches)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionReport {
    pub pitches: Vec<f32>,
    pub male_pitches: Vec<f32>,
    pub female_pitches: Vec<f32>,
    pub suggested_threshold_hz: f32,
    pub suggested_segment_secs: f64,
    pub stats: Option<PitchStats>,
    pub histogram: Option<PitchHistogram>,
}

/// Estimate the pitch of every non-silent `segment_secs` slice and summarise
/// the population.
pub fn analyze_pitch_distribution(
    audio: &AudioBuffer,
    segment_secs: f64,
    silence_peak: f32,
    sink: &dyn ProgressSink,
) -> DistributionReport {
    let sr = audio.sample_rate();
    let mono = audio.to_mono();

    let bursts = speech_bursts(&mono, sr, 0.01);
    let suggested_segment_secs = suggest_segment_secs(&bursts);
    sink.report(
        Step::Analyze,
        &format!(
            "{} speech bursts, suggested segment length {}s",
            bursts.len(),
            suggested_segment_secs
        ),
    );

    let span = ((segment_secs * sr as f64) as usize).max(1);
    let total = mono.len().div_ceil(span);
    let mut pitches = Vec::new();
    for (i, slice) in mono.chunks(span).enumerate() {
        if i > 0 && i % 20 == 0 {
            sink.report(
                Step::Analyze,
                &format!("pitch analysis {}% ({}/{})", i * 100 / total, i, total),
            );
        }
        if slice.iter().fold(0.0f32, |a, &b| a.max(b.abs())) < silence_peak {
            continue;
        }
        let pitch = estimate_pitch(slice, sr);
        if pitch > 0.0 {
            pitches.push(pitch);
        }
    }

    let Some(stats) = PitchStats::of(&pitches) else {
        return DistributionReport {
            pitches,
            male_pitches: Vec::new(),
            female_pitches: Vec::new(),
            suggested_threshold_hz: DEFAULT_THRESHOLD_HZ,
            suggested_segment_secs,
            stats: None,
            histogram: None,
        };
    };

    let histogram = PitchHistogram::new(&pitches, 30);
    let threshold = histogram.valley().unwrap_or(DEFAULT_THRESHOLD_HZ);
    let (male_pitches, female_pitches) = pitches.iter().partition(|&&p| p < threshold);

    sink.report(
        Step::Analyze,
        &format!(
            "{} voiced segments, suggested threshold {} Hz",
            pitches.len(),
            threshold.round()
        ),
    );

    DistributionReport {
        male_pitches,
        female_pitches,
        suggested_threshold_hz: threshold.round(),
        suggested_segment_secs,
        stats: Some(stats),
        histogram: Some(histogram),
        pitches,
    }
}

/// Durations (seconds) of contiguous runs where 25 ms RMS exceeds `gate`,
/// keeping runs longer than 0.1 s
pub fn speech_bursts(samples: &[f32], sample_rate: u32, gate: f32) -> Vec<f64> {
    let frame = (0.025 * sample_rate as f64) as usize;
    let hop = ((0.010 * sample_rate as f64) as usize).max(1);
    let rms = rms_frames(samples, frame, hop);
    let to_secs = |frames: usize| (frames * hop) as f64 / sample_rate as f64;

    let mut bursts = Vec::new();
    let mut run_start = None;
    for (i, &r) in rms.iter().enumerate() {
        match (r > gate, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                bursts.push(to_secs(i - start));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        bursts.push(to_secs(rms.len() - start));
    }

    bursts.retain(|&d| d > 0.1);
    bursts
}

/// 60% of the median burst, rounded to 0.1 s and clamped to [0.2, 2.0]
pub fn suggest_segment_secs(bursts: &[f64]) -> f64 {
    let durations: Vec<f32> = bursts.iter().map(|&d| d as f32).collect();
    match median(&durations) {
        Some(m) => ((m as f64 * 0.6 * 10.0).round() / 10.0).clamp(0.2, 2.0),
        None => DEFAULT_SEGMENT_SECS,
    }
}
