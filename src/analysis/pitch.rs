//! Fundamental frequency estimation.
//!
//! A probabilistic YIN tracker: each frame's cumulative mean normalised
//! difference function is searched for troughs under a sweep of thresholds,
//! and each threshold votes for the trough it selects with a weight taken from
//! a Beta(2, 18) prior. A frame is voiced when the votes sum past one half.

use super::median;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

pub const FRAME_LENGTH: usize = 1024;
pub const HOP_LENGTH: usize = 256;
pub const FMIN: f32 = 50.0;
pub const FMAX: f32 = 400.0;

/// Slices shorter than this return no pitch
pub const MIN_DURATION_SECS: f64 = 0.05;

const N_THRESHOLDS: usize = 100;
const NO_TROUGH_PROB: f32 = 0.01;
const VOICED_PROB: f32 = 0.5;

/// Per-frame tracker output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchFrame {
    /// Estimated F0 in Hz, 0 when unvoiced
    pub f0: f32,
    pub voiced_prob: f32,
}

impl PitchFrame {
    pub fn is_voiced(&self) -> bool {
        self.f0 > 0.0
    }
}

pub struct PitchTracker {
    frame_length: usize,
    hop: usize,
    win: usize,
    fmin: f32,
    fmax: f32,
    fft_len: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    prior: Vec<(f32, f32)>,
}

impl Default for PitchTracker {
    fn default() -> Self {
        Self::new(FRAME_LENGTH, HOP_LENGTH, FMIN, FMAX)
    }
}

impl PitchTracker {
    pub fn new(frame_length: usize, hop: usize, fmin: f32, fmax: f32) -> Self {
        let win = frame_length / 2;
        let fft_len = (frame_length + win).next_power_of_two();
        let mut planner = FftPlanner::new();

        PitchTracker {
            frame_length,
            hop: hop.max(1),
            win,
            fmin,
            fmax,
            fft_len,
            forward: planner.plan_fft_forward(fft_len),
            inverse: planner.plan_fft_inverse(fft_len),
            prior: threshold_prior(),
        }
    }

    /// Track F0 over centred frames (`1 + len / hop` of them)
    pub fn track(&self, samples: &[f32], sample_rate: u32) -> Vec<PitchFrame> {
        let sr = sample_rate as f32;
        let min_tau = ((sr / self.fmax).floor() as usize).max(1);
        let max_tau = ((sr / self.fmin).ceil() as usize).min(self.frame_length - self.win - 1);
        if min_tau + 1 >= max_tau {
            return Vec::new();
        }

        let pad = self.frame_length / 2;
        let frames = 1 + samples.len() / self.hop;
        let mut frame = vec![0.0f32; self.frame_length];

        (0..frames)
            .map(|t| {
                let offset = t * self.hop;
                for (i, slot) in frame.iter_mut().enumerate() {
                    *slot = (offset + i)
                        .checked_sub(pad)
                        .and_then(|j| samples.get(j))
                        .copied()
                        .filter(|s| s.is_finite())
                        .unwrap_or(0.0);
                }
                let cmnd = self.cmnd(&frame, max_tau);
                self.pick(&cmnd, min_tau, max_tau, sr)
            })
            .collect()
    }

    /// F0 of every voiced frame
    pub fn voiced_f0(&self, samples: &[f32], sample_rate: u32) -> Vec<f32> {
        self.track(samples, sample_rate)
            .into_iter()
            .filter(PitchFrame::is_voiced)
            .map(|f| f.f0)
            .collect()
    }

    /// Cumulative mean normalised difference for lags `0..=max_tau`
    fn cmnd(&self, frame: &[f32], max_tau: usize) -> Vec<f32> {
        let n = self.fft_len;
        let mut head: Vec<Complex<f32>> = (0..n)
            .map(|i| Complex::new(if i < self.win { frame[i] } else { 0.0 }, 0.0))
            .collect();
        let mut full: Vec<Complex<f32>> = (0..n)
            .map(|i| Complex::new(frame.get(i).copied().unwrap_or(0.0), 0.0))
            .collect();
        self.forward.process(&mut head);
        self.forward.process(&mut full);
        for (h, f) in head.iter_mut().zip(&full) {
            *h = h.conj() * f;
        }
        self.inverse.process(&mut head);

        let mut energy = vec![0.0f32; frame.len() + 1];
        for (i, &s) in frame.iter().enumerate() {
            energy[i + 1] = energy[i] + s * s;
        }
        let window_energy = |tau: usize| energy[tau + self.win] - energy[tau];

        let e0 = window_energy(0);
        let mut cmnd = vec![1.0f32; max_tau + 1];
        let mut running = 0.0f32;
        for (tau, slot) in cmnd.iter_mut().enumerate().skip(1) {
            let corr = head[tau].re / n as f32;
            let diff = (e0 + window_energy(tau) - 2.0 * corr).max(0.0);
            running += diff;
            if running > f32::EPSILON {
                *slot = diff * tau as f32 / running;
            }
        }
        cmnd
    }

    fn pick(&self, cmnd: &[f32], min_tau: usize, max_tau: usize, sr: f32) -> PitchFrame {
        let troughs: Vec<usize> = (min_tau..max_tau)
            .filter(|&tau| {
                let rises_right = cmnd[tau] <= cmnd[tau + 1];
                if tau == min_tau {
                    cmnd[tau] < cmnd[tau + 1]
                } else {
                    cmnd[tau] < cmnd[tau - 1] && rises_right
                }
            })
            .collect();
        let Some(&deepest) = troughs.iter().min_by(|&&a, &&b| cmnd[a].total_cmp(&cmnd[b])) else {
            return PitchFrame { f0: 0.0, voiced_prob: 0.0 };
        };

        let mut votes = vec![0.0f32; troughs.len()];
        for &(threshold, weight) in &self.prior {
            match troughs.iter().position(|&tau| cmnd[tau] < threshold) {
                Some(i) => votes[i] += weight,
                None => {
                    if let Some(i) = troughs.iter().position(|&tau| tau == deepest) {
                        votes[i] += weight * NO_TROUGH_PROB;
                    }
                }
            }
        }

        let voiced_prob: f32 = votes.iter().sum();
        let best = votes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| troughs[i])
            .unwrap_or(deepest);

        if voiced_prob <= VOICED_PROB {
            return PitchFrame { f0: 0.0, voiced_prob };
        }

        let period = best as f32 + parabolic_offset(cmnd, best);
        PitchFrame {
            f0: sr / period,
            voiced_prob,
        }
    }
}

/// Sub-sample refinement of a trough at `tau`
fn parabolic_offset(values: &[f32], tau: usize) -> f32 {
    if tau == 0 || tau + 1 >= values.len() {
        return 0.0;
    }
    let (a, b, c) = (values[tau - 1], values[tau], values[tau + 1]);
    let denom = a - 2.0 * b + c;
    if denom.abs() < f32::EPSILON {
        return 0.0;
    }
    (0.5 * (a - c) / denom).clamp(-1.0, 1.0)
}

/// Thresholds 0.01..=1.0 paired with their Beta(2, 18) probability mass
fn threshold_prior() -> Vec<(f32, f32)> {
    // Closed-form CDF of Beta(2, 18)
    let cdf = |x: f64| 1.0 - (1.0 - x).powi(19) - 19.0 * x * (1.0 - x).powi(18);
    (1..=N_THRESHOLDS)
        .map(|i| {
            let hi = i as f64 / N_THRESHOLDS as f64;
            let lo = (i - 1) as f64 / N_THRESHOLDS as f64;
            (hi as f32, (cdf(hi) - cdf(lo)) as f32)
        })
        .collect()
}

/// Median F0 of the voiced frames in `samples`.
///
/// Returns 0 for slices shorter than 50 ms and for slices with no voiced
/// frame, so callers can treat 0 as "no reliable pitch".
pub fn estimate_pitch(samples: &[f32], sample_rate: u32) -> f32 {
    if (samples.len() as f64) < sample_rate as f64 * MIN_DURATION_SECS {
        return 0.0;
    }
    let voiced = PitchTracker::default().voiced_f0(samples, sample_rate);
    median(&voiced).unwrap_or(0.0)
}

/// Pitch of a long signal from a sparse sample of its loud passages.
///
/// Picks `num_samples` evenly spaced frames among those whose RMS exceeds 20%
/// of the mean RMS, estimates a 0.5 s window starting at each, and returns the
/// median of the non-zero estimates. Signals under 0.5 s go straight to
/// [`estimate_pitch`].
pub fn estimate_pitch_for_long_signal(samples: &[f32], sample_rate: u32, num_samples: usize) -> f32 {
    const FRAME: usize = 2048;
    const HOP: usize = 512;

    let sr = sample_rate as f64;
    if (samples.len() as f64) < sr * 0.5 {
        return estimate_pitch(samples, sample_rate);
    }

    let rms = rms_frames(samples, FRAME, HOP);
    let Some(mean_rms) = super::mean(&rms) else {
        return 0.0;
    };
    let voiced: Vec<usize> = rms
        .iter()
        .enumerate()
        .filter(|&(_, &r)| r > mean_rms * 0.2)
        .map(|(i, _)| i)
        .collect();
    if voiced.len() < 10 || num_samples == 0 {
        return 0.0;
    }

    let count = num_samples.min(voiced.len());
    let window = (sr * 0.5) as usize;
    let pitches: Vec<f32> = linspace_indices(voiced.len() - 1, count)
        .into_iter()
        .filter_map(|i| {
            let start = voiced[i] * HOP;
            let end = (start + window).min(samples.len());
            if start >= end || ((end - start) as f64) < sr * 0.1 {
                return None;
            }
            Some(estimate_pitch(&samples[start..end], sample_rate))
        })
        .filter(|&p| p > 0.0)
        .collect();

    log::debug!(
        "long-signal pitch: {} voiced frames, {} usable windows",
        voiced.len(),
        pitches.len()
    );
    median(&pitches).unwrap_or(0.0)
}

/// `count` evenly spaced integer indices over `0..=last`, truncated
fn linspace_indices(last: usize, count: usize) -> Vec<usize> {
    if count <= 1 {
        return vec![0; count];
    }
    (0..count)
        .map(|i| (i as f64 * last as f64 / (count - 1) as f64) as usize)
        .collect()
}

/// Short-time RMS over centred, zero-padded frames (`1 + len / hop` of them)
pub fn rms_frames(samples: &[f32], frame: usize, hop: usize) -> Vec<f32> {
    let hop = hop.max(1);
    let pad = frame / 2;
    let mut squares = vec![0.0f64; samples.len() + 1];
    for (i, &s) in samples.iter().enumerate() {
        squares[i + 1] = squares[i] + (s as f64) * (s as f64);
    }

    (0..1 + samples.len() / hop)
        .map(|t| {
            // Frame covers padded [t*hop, t*hop + frame), i.e. signal [t*hop - pad, ...)
            let lo = (t * hop).saturating_sub(pad).min(samples.len());
            let hi = (t * hop + frame).saturating_sub(pad).min(samples.len());
            let energy = (squares[hi] - squares[lo]).max(0.0);
            (energy / frame as f64).sqrt() as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: u32, secs: f32) -> Vec<f32> {
        let len = (sample_rate as f32 * secs) as usize;
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_estimate_pitch_of_sines() {
        for (freq, sr) in [(110.0, 44100), (220.0, 44100), (150.0, 16000), (300.0, 22050)] {
            let pitch = estimate_pitch(&sine(freq, sr, 0.5), sr);
            assert!((pitch - freq).abs() < freq * 0.02, "{} Hz estimated as {}", freq, pitch);
        }
    }

    #[test]
    fn test_silence_has_no_pitch() {
        assert_eq!(estimate_pitch(&vec![0.0; 22050], 44100), 0.0);
    }

    #[test]
    fn test_short_slice_has_no_pitch() {
        // 40 ms
        assert_eq!(estimate_pitch(&sine(200.0, 44100, 0.04), 44100), 0.0);
    }

    #[test]
    fn test_track_frame_count() {
        let tracker = PitchTracker::default();
        assert_eq!(tracker.track(&vec![0.0; 1000], 16000).len(), 1 + 1000 / HOP_LENGTH);
    }

    #[test]
    fn test_threshold_prior_sums_to_one() {
        let total: f32 = threshold_prior().iter().map(|p| p.1).sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_long_signal_ignores_quiet_gaps() {
        let sr = 16000;
        let mut samples = sine(140.0, sr, 2.0);
        samples.extend(vec![0.0; sr as usize]);
        samples.extend(sine(140.0, sr, 2.0));

        let pitch = estimate_pitch_for_long_signal(&samples, sr, 20);
        assert!((pitch - 140.0).abs() < 3.0, "estimated {}", pitch);
    }

    #[test]
    fn test_long_signal_silence_is_zero() {
        assert_eq!(estimate_pitch_for_long_signal(&vec![0.0; 32000], 16000, 20), 0.0);
    }

    #[test]
    fn test_rms_frames() {
        let rms = rms_frames(&vec![0.5; 4096], 2048, 512);
        assert_eq!(rms.len(), 9);
        // Fully inside the signal
        assert!((rms[4] - 0.5).abs() < 1e-6);
        // Half padded
        assert!((rms[0] - 0.5 / 2f32.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn test_linspace_indices() {
        assert_eq!(linspace_indices(9, 4), vec![0, 3, 6, 9]);
        assert_eq!(linspace_indices(5, 1), vec![0]);
    }
}
