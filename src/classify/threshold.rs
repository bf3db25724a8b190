//! Pitch-threshold gender decision and its adaptive per-window threshold.

use crate::analysis::distribution::PitchHistogram;
use crate::analysis::median;

/// Fewer pitches than this keep the base threshold
const MIN_POPULATION: usize = 10;
const HISTOGRAM_BINS: usize = 20;

/// `true` only for a detected pitch strictly below the threshold; a pitch of
/// 0 (undetected) is never male
pub fn is_male(pitch_hz: f32, threshold_hz: f32) -> bool {
    pitch_hz > 0.0 && pitch_hz < threshold_hz
}

/// Threshold for one window's pitch population.
///
/// Uses the valley of a bimodal pitch histogram when there is one, otherwise
/// nudges the base by 10 Hz toward the population's side (within [140, 190]).
pub fn local_threshold(pitches: &[f32], base: f32) -> f32 {
    if pitches.len() < MIN_POPULATION {
        return base;
    }

    if let Some(valley) = PitchHistogram::new(pitches, HISTOGRAM_BINS).valley() {
        return valley;
    }

    match median(pitches) {
        Some(m) if m < 140.0 => (base + 10.0).min(190.0),
        Some(m) if m > 200.0 => (base - 10.0).max(140.0),
        _ => base,
    }
}

/// Threshold per fixed-length window of the signal
#[derive(Debug, Clone, PartialEq)]
pub struct WindowThresholds {
    window_samples: usize,
    thresholds: Vec<f32>,
    populations: Vec<usize>,
}

impl WindowThresholds {
    /// One global threshold
    pub fn fixed(threshold: f32, total_samples: usize) -> Self {
        WindowThresholds {
            window_samples: total_samples.max(1),
            thresholds: vec![threshold],
            populations: vec![0],
        }
    }

    /// Compute thresholds from `(start_sample, pitch)` observations.
    ///
    /// Windows are only used when `window_secs > 0` and the signal is longer
    /// than one window; otherwise every observation lands in a single window.
    pub fn compute(
        observations: &[(usize, f32)],
        base: f32,
        window_secs: f64,
        total_samples: usize,
        sample_rate: u32,
    ) -> Self {
        let total_secs = total_samples as f64 / sample_rate as f64;
        let (window_samples, count) = if window_secs > 0.0 && total_secs > window_secs {
            let window = ((window_secs * sample_rate as f64) as usize).max(1);
            (window, total_samples.div_ceil(window))
        } else {
            (total_samples.max(1), 1)
        };

        let mut grouped: Vec<Vec<f32>> = vec![Vec::new(); count];
        for &(start, pitch) in observations {
            if pitch > 0.0 {
                grouped[(start / window_samples).min(count - 1)].push(pitch);
            }
        }

        WindowThresholds {
            window_samples,
            thresholds: grouped.iter().map(|p| local_threshold(p, base)).collect(),
            populations: grouped.iter().map(Vec::len).collect(),
        }
    }

    /// Threshold for a segment starting at `start_sample`
    pub fn for_sample(&self, start_sample: usize) -> f32 {
        let idx = (start_sample / self.window_samples).min(self.thresholds.len() - 1);
        self.thresholds[idx]
    }

    pub fn thresholds(&self) -> &[f32] {
        &self.thresholds
    }

    /// Number of pitches each window's threshold was derived from
    pub fn populations(&self) -> &[usize] {
        &self.populations
    }

    pub fn window_samples(&self) -> usize {
        self.window_samples
    }

    pub fn is_adaptive(&self) -> bool {
        self.thresholds.len() > 1
    }
}
