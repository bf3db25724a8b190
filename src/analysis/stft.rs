use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// One analysis frame: `n_fft / 2 + 1` complex bins
pub type Spectrum = Vec<Complex<f32>>;

/// Centred short-time Fourier transform with a periodic Hann window.
///
/// The signal is zero-padded by `n_fft / 2` on both sides, so frame `t` is
/// centred on sample `t * hop`.
pub struct Stft {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl Stft {
    pub fn new(n_fft: usize, hop: usize) -> Self {
        let mut planner = FftPlanner::new();
        Stft {
            n_fft,
            hop: hop.max(1),
            window: hann(n_fft),
            forward: planner.plan_fft_forward(n_fft),
            inverse: planner.plan_fft_inverse(n_fft),
        }
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Number of frequency bins per frame
    pub fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Centre frequency of every bin
    pub fn bin_frequencies(&self, sample_rate: u32) -> Vec<f32> {
        (0..self.bins())
            .map(|k| k as f32 * sample_rate as f32 / self.n_fft as f32)
            .collect()
    }

    /// Number of frames produced for a signal of `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        1 + len / self.hop
    }

    /// Forward transform, one spectrum per frame
    pub fn forward(&self, signal: &[f32]) -> Vec<Spectrum> {
        let pad = self.n_fft / 2;
        let padded_len = signal.len() + 2 * pad;
        let sample_at = |i: usize| -> f32 {
            if i < pad || i >= pad + signal.len() {
                0.0
            } else {
                signal[i - pad]
            }
        };

        let frames = 1 + (padded_len - self.n_fft) / self.hop;
        let mut buf = vec![Complex::new(0.0f32, 0.0); self.n_fft];
        (0..frames)
            .map(|t| {
                let offset = t * self.hop;
                for (i, slot) in buf.iter_mut().enumerate() {
                    *slot = Complex::new(sample_at(offset + i) * self.window[i], 0.0);
                }
                self.forward.process(&mut buf);
                buf[..self.bins()].to_vec()
            })
            .collect()
    }

    /// Magnitude spectrogram
    pub fn magnitudes(&self, signal: &[f32]) -> Vec<Vec<f32>> {
        self.forward(signal)
            .into_iter()
            .map(|frame| frame.iter().map(|c| c.norm()).collect())
            .collect()
    }

    /// Inverse transform by windowed overlap-add, trimmed to `length` samples
    pub fn inverse(&self, frames: &[Spectrum], length: usize) -> Vec<f32> {
        if frames.is_empty() {
            return vec![0.0; length];
        }

        let n = self.n_fft;
        let half = n / 2;
        let total = n + self.hop * (frames.len() - 1);
        let mut signal = vec![0.0f32; total];
        let mut norm = vec![0.0f32; total];
        let mut buf = vec![Complex::new(0.0f32, 0.0); n];

        for (t, spectrum) in frames.iter().enumerate() {
            for k in 0..=half {
                buf[k] = spectrum[k];
            }
            buf[0].im = 0.0;
            buf[half].im = 0.0;
            for k in 1..half {
                buf[n - k] = spectrum[k].conj();
            }
            self.inverse.process(&mut buf);

            let offset = t * self.hop;
            for i in 0..n {
                let w = self.window[i];
                signal[offset + i] += buf[i].re / n as f32 * w;
                norm[offset + i] += w * w;
            }
        }

        for (s, &w) in signal.iter_mut().zip(&norm) {
            if w > f32::MIN_POSITIVE {
                *s /= w;
            }
        }

        let mut out: Vec<f32> = signal.into_iter().skip(half).take(length).collect();
        out.resize(length, 0.0);
        out
    }
}

/// Periodic Hann window
pub fn hann(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count_matches_forward() {
        let stft = Stft::new(2048, 512);
        for len in [1usize, 511, 512, 22050] {
            assert_eq!(stft.forward(&vec![0.1; len]).len(), stft.frame_count(len));
        }
    }

    #[test]
    fn test_round_trip_reconstructs_signal() {
        let stft = Stft::new(512, 128);
        let signal: Vec<f32> = (0..4000).map(|i| (i as f32 * 0.03).sin() * 0.4).collect();
        let rebuilt = stft.inverse(&stft.forward(&signal), signal.len());

        assert_eq!(rebuilt.len(), signal.len());
        for (a, b) in signal.iter().zip(&rebuilt).skip(10).take(3900) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let stft = Stft::new(1024, 256);
        let sr = 8000;
        // 1000 Hz lands exactly on bin 128
        let signal: Vec<f32> = (0..8000)
            .map(|i| (2.0 * PI * 1000.0 * i as f32 / sr as f32).sin())
            .collect();
        let mags = stft.magnitudes(&signal);
        let frame = &mags[mags.len() / 2];
        let peak_bin = frame
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |best, (k, &m)| if m > best.1 { (k, m) } else { best })
            .0;
        assert_eq!(peak_bin, 128);
        assert!((stft.bin_frequencies(sr)[peak_bin] - 1000.0).abs() < 1e-3);
    }
}
