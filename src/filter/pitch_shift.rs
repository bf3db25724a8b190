use crate::analysis::stft::{Spectrum, Stft};
use crate::core::AudioBuffer;
use crate::error::{AudioError, AudioResult};
use crate::filter::resample::linear_interpolate;
use rustfft::num_complex::Complex;
use std::f32::consts::PI;

const N_FFT: usize = 2048;
const HOP: usize = 512;

/// Duration-preserving pitch shifter.
///
/// Time-stretches with a phase vocoder by `rate = 2^(-semitones / 12)` and
/// resamples the result back to the original length, so the output always
/// has exactly as many samples as the input.
pub struct PitchShift {
    semitones: f64,
    stft: Stft,
}

impl PitchShift {
    /// Create a shifter; negative semitones lower the pitch
    pub fn new(semitones: f64) -> AudioResult<Self> {
        if !semitones.is_finite() {
            return Err(AudioError::ConfigError(format!(
                "Pitch shift must be finite, got {}",
                semitones
            )));
        }

        Ok(PitchShift {
            semitones,
            stft: Stft::new(N_FFT, HOP),
        })
    }

    pub fn semitones(&self) -> f64 {
        self.semitones
    }

    /// Time-stretch rate used by the vocoder
    pub fn rate(&self) -> f64 {
        2f64.powf(-self.semitones / 12.0)
    }

    /// Shift one channel of samples
    pub fn shift(&self, samples: &[f32]) -> Vec<f32> {
        if self.semitones == 0.0 || samples.is_empty() {
            return samples.to_vec();
        }

        let rate = self.rate();
        let stretched_len = ((samples.len() as f64 / rate).round() as usize).max(1);
        let spectra = phase_vocoder(&self.stft.forward(samples), rate, HOP, N_FFT);
        let stretched = self.stft.inverse(&spectra, stretched_len);

        // Resample by `rate` and force the original length
        linear_interpolate(&stretched, 1.0 / rate, samples.len())
    }
}

impl super::Filter for PitchShift {
    fn process(&mut self, buffer: &AudioBuffer) -> AudioResult<AudioBuffer> {
        let planar = buffer
            .planar()
            .iter()
            .map(|channel| self.shift(channel))
            .collect();
        AudioBuffer::new(planar, buffer.sample_rate())
    }
}

/// Resample STFT frames at fractional steps of `rate`, accumulating phase so
/// partials stay coherent across the new frame spacing.
fn phase_vocoder(frames: &[Spectrum], rate: f64, hop: usize, n_fft: usize) -> Vec<Spectrum> {
    if frames.is_empty() {
        return Vec::new();
    }

    let bins = frames[0].len();
    let zero = vec![Complex::new(0.0f32, 0.0); bins];
    let column = |i: usize| frames.get(i).unwrap_or(&zero);

    let advance: Vec<f32> = (0..bins)
        .map(|k| 2.0 * PI * k as f32 * hop as f32 / n_fft as f32)
        .collect();
    let mut phase: Vec<f32> = frames[0].iter().map(|c| c.arg()).collect();

    let steps = (frames.len() as f64 / rate).ceil() as usize;
    let mut out = Vec::with_capacity(steps);
    for n in 0..steps {
        let step = n as f64 * rate;
        let idx = step.floor() as usize;
        let alpha = (step - idx as f64) as f32;
        let (left, right) = (column(idx), column(idx + 1));

        let spectrum: Spectrum = (0..bins)
            .map(|k| {
                let mag = (1.0 - alpha) * left[k].norm() + alpha * right[k].norm();
                Complex::from_polar(mag, phase[k])
            })
            .collect();
        out.push(spectrum);

        for k in 0..bins {
            let mut delta = right[k].arg() - left[k].arg() - advance[k];
            delta -= 2.0 * PI * (delta / (2.0 * PI)).round();
            phase[k] += advance[k] + delta;
        }
    }
    out
}
