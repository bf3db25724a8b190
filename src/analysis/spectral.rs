//! Short-time spectral descriptors: centroid, rolloff and MFCCs.

use super::median;
use super::stft::Stft;
use serde::Serialize;
use std::f32::consts::PI;

pub const N_FFT: usize = 2048;
pub const HOP_LENGTH: usize = 512;
pub const N_MELS: usize = 128;
pub const N_MFCC: usize = 13;
pub const ROLL_PERCENT: f32 = 0.85;

/// Frame-wise magnitude spectrogram with its bin frequencies
pub struct Spectrogram {
    pub frames: Vec<Vec<f32>>,
    pub freqs: Vec<f32>,
    pub sample_rate: u32,
}

impl Spectrogram {
    pub fn compute(samples: &[f32], sample_rate: u32) -> Self {
        let stft = Stft::new(N_FFT, HOP_LENGTH);
        Spectrogram {
            frames: stft.magnitudes(samples),
            freqs: stft.bin_frequencies(sample_rate),
            sample_rate,
        }
    }

    /// Magnitude-weighted mean frequency of each frame
    pub fn centroid(&self) -> Vec<f32> {
        self.frames
            .iter()
            .map(|frame| {
                let total: f32 = frame.iter().sum();
                if total <= f32::EPSILON {
                    return 0.0;
                }
                frame.iter().zip(&self.freqs).map(|(m, f)| m * f).sum::<f32>() / total
            })
            .collect()
    }

    /// Lowest frequency below which `roll_percent` of each frame's magnitude lies
    pub fn rolloff(&self, roll_percent: f32) -> Vec<f32> {
        self.frames
            .iter()
            .map(|frame| {
                let target = roll_percent * frame.iter().sum::<f32>();
                let mut acc = 0.0;
                for (m, &f) in frame.iter().zip(&self.freqs) {
                    acc += m;
                    if acc >= target {
                        return f;
                    }
                }
                self.freqs.last().copied().unwrap_or(0.0)
            })
            .collect()
    }

    /// MFCCs per frame (`n_mfcc` each) from an 80 dB floored log-mel spectrum
    pub fn mfcc(&self, n_mfcc: usize) -> Vec<Vec<f32>> {
        let bank = MelBank::new(self.sample_rate, N_FFT, N_MELS);
        let mut log_mel: Vec<Vec<f32>> = self
            .frames
            .iter()
            .map(|frame| {
                bank.apply_power(frame)
                    .into_iter()
                    .map(|p| 10.0 * p.max(1e-10).log10())
                    .collect()
            })
            .collect();

        let top = log_mel
            .iter()
            .flatten()
            .fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        for frame in &mut log_mel {
            for v in frame.iter_mut() {
                *v = v.max(top - 80.0);
            }
        }

        log_mel.iter().map(|frame| dct_ortho(frame, n_mfcc)).collect()
    }
}

/// Per-slice medians of the spectral descriptors
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectralSummary {
    pub centroid: f32,
    pub rolloff: f32,
    pub mfcc: Vec<f32>,
}

impl SpectralSummary {
    /// Summarise a slice; `None` for an empty slice
    pub fn analyze(samples: &[f32], sample_rate: u32) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let spec = Spectrogram::compute(samples, sample_rate);
        let mfccs = spec.mfcc(N_MFCC);
        let mfcc = (0..N_MFCC)
            .map(|k| {
                let column: Vec<f32> = mfccs.iter().map(|frame| frame[k]).collect();
                median(&column).unwrap_or(0.0)
            })
            .collect();

        Some(SpectralSummary {
            centroid: median(&spec.centroid())?,
            rolloff: median(&spec.rolloff(ROLL_PERCENT))?,
            mfcc,
        })
    }

    /// Second MFCC, a spectral-tilt proxy
    pub fn mfcc2(&self) -> Option<f32> {
        self.mfcc.get(1).copied()
    }
}

/// Triangular, area-normalised mel filters on the Slaney scale
struct MelBank {
    /// (first bin, weights)
    filters: Vec<(usize, Vec<f32>)>,
}

impl MelBank {
    fn new(sample_rate: u32, n_fft: usize, n_mels: usize) -> Self {
        let bins = n_fft / 2 + 1;
        let fmax = sample_rate as f32 / 2.0;
        let (lo, hi) = (hz_to_mel(0.0), hz_to_mel(fmax));
        let points: Vec<f32> = (0..n_mels + 2)
            .map(|i| mel_to_hz(lo + (hi - lo) * i as f32 / (n_mels + 1) as f32))
            .collect();
        let bin_hz = |k: usize| k as f32 * sample_rate as f32 / n_fft as f32;

        let filters = (0..n_mels)
            .map(|m| {
                let (left, centre, right) = (points[m], points[m + 1], points[m + 2]);
                let norm = 2.0 / (right - left);
                let weights: Vec<(usize, f32)> = (0..bins)
                    .filter_map(|k| {
                        let f = bin_hz(k);
                        let rise = (f - left) / (centre - left);
                        let fall = (right - f) / (right - centre);
                        let w = rise.min(fall);
                        (w > 0.0).then_some((k, w * norm))
                    })
                    .collect();
                let start = weights.first().map(|w| w.0).unwrap_or(0);
                (start, weights.into_iter().map(|w| w.1).collect())
            })
            .collect();

        MelBank { filters }
    }

    fn apply_power(&self, magnitudes: &[f32]) -> Vec<f32> {
        self.filters
            .iter()
            .map(|(start, weights)| {
                weights
                    .iter()
                    .zip(&magnitudes[*start..])
                    .map(|(w, m)| w * m * m)
                    .sum()
            })
            .collect()
    }
}

fn hz_to_mel(hz: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    let log_step = 6.4f32.ln() / 27.0;
    if hz >= 1000.0 {
        15.0 + (hz / 1000.0).ln() / log_step
    } else {
        hz / F_SP
    }
}

fn mel_to_hz(mel: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    let log_step = 6.4f32.ln() / 27.0;
    if mel >= 15.0 {
        1000.0 * (log_step * (mel - 15.0)).exp()
    } else {
        mel * F_SP
    }
}

/// Orthonormal DCT-II, first `n_out` coefficients
fn dct_ortho(input: &[f32], n_out: usize) -> Vec<f32> {
    let n = input.len() as f32;
    (0..n_out)
        .map(|k| {
            let sum: f32 = input
                .iter()
                .enumerate()
                .map(|(i, &x)| x * (PI * k as f32 * (2.0 * i as f32 + 1.0) / (2.0 * n)).cos())
                .sum();
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            sum * scale
        })
        .collect()
}
