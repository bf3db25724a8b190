//! Formant tracking.
//!
//! [`FormantExtractor`] is the seam for an external acoustic-analysis routine;
//! [`LpcFormantExtractor`] is the in-crate implementation used when nothing
//! else is injected.

use crate::core::AudioBuffer;
use crate::error::AudioResult;
use crate::filter::{Filter, Resample};
use std::f64::consts::PI;

/// One analysis frame; any formant may be absent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormantFrame {
    /// Frame centre in seconds
    pub time: f64,
    pub f1: Option<f32>,
    pub f2: Option<f32>,
    pub f3: Option<f32>,
}

impl FormantFrame {
    fn empty(time: f64) -> Self {
        FormantFrame {
            time,
            f1: None,
            f2: None,
            f3: None,
        }
    }
}

/// Per-frame F1/F2/F3 extraction over a mono slice
pub trait FormantExtractor: Send + Sync {
    fn formants(
        &self,
        samples: &[f32],
        sample_rate: u32,
        max_formant_hz: f32,
    ) -> AudioResult<Vec<FormantFrame>>;
}

/// Linear-prediction formant tracker.
///
/// Resamples to twice the maximum formant, pre-emphasises, fits an LPC model
/// per windowed frame (Levinson-Durbin) and reads formants off the peaks of the
/// LPC spectral envelope.
#[derive(Debug, Clone)]
pub struct LpcFormantExtractor {
    pub window_secs: f64,
    pub step_secs: f64,
    pub max_formants: usize,
    pub pre_emphasis_hz: f64,
}

impl Default for LpcFormantExtractor {
    fn default() -> Self {
        LpcFormantExtractor {
            window_secs: 0.025,
            step_secs: 0.01,
            max_formants: 4,
            pre_emphasis_hz: 50.0,
        }
    }
}

const ENVELOPE_POINTS: usize = 512;
const SILENT_RMS: f64 = 1e-4;

impl FormantExtractor for LpcFormantExtractor {
    fn formants(
        &self,
        samples: &[f32],
        sample_rate: u32,
        max_formant_hz: f32,
    ) -> AudioResult<Vec<FormantFrame>> {
        let target = ((2.0 * max_formant_hz) as u32).min(sample_rate);
        let signal: Vec<f64> = if target == sample_rate {
            samples.iter().map(|&s| s as f64).collect()
        } else {
            let input = AudioBuffer::mono(samples.to_vec(), sample_rate)?;
            let resampled = Resample::new(sample_rate, target)?.process(&input)?;
            resampled.channel(0).iter().map(|&s| s as f64).collect()
        };
        let fs = target as f64;

        // Pre-emphasis
        let alpha = (-2.0 * PI * self.pre_emphasis_hz / fs).exp();
        let emphasised: Vec<f64> = (0..signal.len())
            .map(|i| signal[i] - if i > 0 { alpha * signal[i - 1] } else { 0.0 })
            .collect();

        let win = ((self.window_secs * fs).round() as usize).max(2 * self.max_formants + 2);
        let step = ((self.step_secs * fs).round() as usize).max(1);
        let window: Vec<f64> = (0..win)
            .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (win - 1) as f64).cos())
            .collect();
        let order = 2 * self.max_formants;

        let mut frames = Vec::new();
        let mut start = 0;
        while start + win <= emphasised.len() {
            let time = (start as f64 + win as f64 / 2.0) / fs;
            let raw = &emphasised[start..start + win];
            start += step;

            let rms = (raw.iter().map(|s| s * s).sum::<f64>() / win as f64).sqrt();
            if rms < SILENT_RMS {
                frames.push(FormantFrame::empty(time));
                continue;
            }

            let windowed: Vec<f64> = raw.iter().zip(&window).map(|(s, w)| s * w).collect();
            let Some(coeffs) = levinson_durbin(&autocorrelation(&windowed, order), order) else {
                frames.push(FormantFrame::empty(time));
                continue;
            };

            let peaks = envelope_peaks(&coeffs, fs, max_formant_hz as f64);
            frames.push(FormantFrame {
                time,
                f1: peaks.first().map(|&f| f as f32),
                f2: peaks.get(1).map(|&f| f as f32),
                f3: peaks.get(2).map(|&f| f as f32),
            });
        }

        Ok(frames)
    }
}

fn autocorrelation(x: &[f64], max_lag: usize) -> Vec<f64> {
    (0..=max_lag)
        .map(|lag| x.iter().zip(&x[lag..]).map(|(a, b)| a * b).sum())
        .collect()
}

/// Prediction polynomial `[1, a1, .., a_order]`, `None` for a degenerate frame
fn levinson_durbin(r: &[f64], order: usize) -> Option<Vec<f64>> {
    if r[0] <= 0.0 {
        return None;
    }

    let mut a = vec![0.0; order + 1];
    a[0] = 1.0;
    let mut err = r[0];

    for i in 1..=order {
        let acc: f64 = r[i] + (1..i).map(|j| a[j] * r[i - j]).sum::<f64>();
        let k = -acc / err;

        let prev = a.clone();
        for j in 1..i {
            a[j] = prev[j] + k * prev[i - j];
        }
        a[i] = k;

        err *= 1.0 - k * k;
        if err <= 0.0 {
            return None;
        }
    }

    Some(a)
}

/// Frequencies of the local maxima of `1 / |A(e^jw)|` between 50 Hz and
/// `max_hz - 50`
fn envelope_peaks(a: &[f64], fs: f64, max_hz: f64) -> Vec<f64> {
    let nyquist = fs / 2.0;
    let envelope: Vec<f64> = (0..ENVELOPE_POINTS)
        .map(|i| {
            let w = PI * i as f64 / (ENVELOPE_POINTS - 1) as f64;
            let (re, im) = a.iter().enumerate().fold((0.0, 0.0), |(re, im), (k, &c)| {
                (re + c * (w * k as f64).cos(), im - c * (w * k as f64).sin())
            });
            1.0 / (re * re + im * im).sqrt().max(1e-12)
        })
        .collect();

    let hz = |i: usize| nyquist * i as f64 / (ENVELOPE_POINTS - 1) as f64;
    (1..ENVELOPE_POINTS - 1)
        .filter(|&i| envelope[i] > envelope[i - 1] && envelope[i] >= envelope[i + 1])
        .map(hz)
        .filter(|&f| f > 50.0 && f < max_hz - 50.0)
        .collect()
}
