use crate::error::{AudioError, AudioResult};
use std::time::Duration;

/// Channel configuration for audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    /// Mono (1 channel)
    Mono = 1,
    /// Stereo (2 channels)
    Stereo = 2,
}

impl Channels {
    /// Create Channels from channel count
    pub fn from_count(count: u32) -> AudioResult<Self> {
        match count {
            1 => Ok(Channels::Mono),
            2 => Ok(Channels::Stereo),
            n => Err(AudioError::InvalidChannels {
                expected: 2,
                got: n,
            }),
        }
    }

    /// Get the number of channels
    pub fn count(&self) -> u32 {
        *self as u32
    }

    /// Get channel layout name
    pub fn name(&self) -> &'static str {
        match self {
            Channels::Mono => "Mono",
            Channels::Stereo => "Stereo",
        }
    }
}

/// Bit depth of PCM written to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    /// 16-bit signed (what the media tool extracts and muxes)
    I16,
    /// 32-bit floating point (internal standard)
    F32,
}

impl BitDepth {
    /// Get bits per sample
    pub fn bits(&self) -> u16 {
        match self {
            BitDepth::I16 => 16,
            BitDepth::F32 => 32,
        }
    }
}

/// Whole-file planar audio: one sample vector per channel, all the same length.
///
/// Samples are f32 in -1.0..=1.0. Stages never mutate a buffer they received;
/// the compositor clones the source and writes into its own copy.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer from planar channel data
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> AudioResult<Self> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate { rate: sample_rate });
        }
        Channels::from_count(channels.len() as u32)?;

        let frames = channels[0].len();
        if channels.iter().any(|c| c.len() != frames) {
            return Err(AudioError::BufferError(
                "Channel lengths differ".to_string(),
            ));
        }

        Ok(AudioBuffer {
            channels,
            sample_rate,
        })
    }

    /// Create a mono buffer
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> AudioResult<Self> {
        Self::new(vec![samples], sample_rate)
    }

    /// Create a buffer from interleaved samples
    pub fn from_interleaved(
        samples: &[f32],
        sample_rate: u32,
        channels: Channels,
    ) -> AudioResult<Self> {
        let count = channels.count() as usize;
        if samples.len() % count != 0 {
            return Err(AudioError::BufferError(
                "Sample count not divisible by channel count".to_string(),
            ));
        }

        let mut planar = vec![Vec::with_capacity(samples.len() / count); count];
        for frame in samples.chunks_exact(count) {
            for (ch, &s) in frame.iter().enumerate() {
                planar[ch].push(s);
            }
        }

        Self::new(planar, sample_rate)
    }

    /// Interleave channels into a single vector
    pub fn to_interleaved(&self) -> Vec<f32> {
        let frames = self.frames();
        let count = self.channels.len();
        let mut out = Vec::with_capacity(frames * count);
        for i in 0..frames {
            for ch in &self.channels {
                out.push(ch[i]);
            }
        }
        out
    }

    /// Get sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get channel configuration
    pub fn channels(&self) -> Channels {
        if self.channels.len() == 2 {
            Channels::Stereo
        } else {
            Channels::Mono
        }
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples of one channel
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// Mutable samples of one channel
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    /// All channels
    pub fn planar(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Consume the buffer, returning its planar data
    pub fn into_planar(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Get number of samples per channel
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Duration of the buffer
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs())
    }

    /// Convert a time to the nearest frame index, clamped to the buffer length
    pub fn seconds_to_frame(&self, seconds: f64) -> usize {
        if seconds <= 0.0 {
            return 0;
        }
        ((seconds * self.sample_rate as f64).round() as usize).min(self.frames())
    }

    /// Peak absolute amplitude across all channels
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0f32, |a, &b| a.max(b.abs()))
    }

    /// Average all channels into one
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels.len() == 1 {
            return self.channels[0].clone();
        }
        let scale = 1.0 / self.channels.len() as f32;
        (0..self.frames())
            .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() * scale)
            .collect()
    }

    /// Return a copy with the requested layout (mono is averaged, stereo duplicated)
    pub fn with_channels(&self, channels: Channels) -> AudioBuffer {
        if channels == self.channels() {
            return self.clone();
        }
        let planar = match channels {
            Channels::Mono => vec![self.to_mono()],
            Channels::Stereo => vec![self.channels[0].clone(), self.channels[0].clone()],
        };
        AudioBuffer {
            channels: planar,
            sample_rate: self.sample_rate,
        }
    }

    /// Scale every sample by `gain`
    pub fn apply_gain(&mut self, gain: f32) {
        for ch in &mut self.channels {
            for s in ch.iter_mut() {
                *s *= gain;
            }
        }
    }
}
