use crate::core::{AudioBuffer, BitDepth, Channels};
use crate::error::{AudioError, AudioResult};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// WAV audio encoder
pub struct WavEncoder {
    writer: Option<WavWriter<BufWriter<File>>>,
    sample_rate: u32,
    channels: Channels,
    bit_depth: BitDepth,
}

impl WavEncoder {
    /// Create a new 32-bit float WAV encoder to file
    pub fn new<P: AsRef<Path>>(path: P, sample_rate: u32, channels: Channels) -> AudioResult<Self> {
        Self::with_bit_depth(path, sample_rate, channels, BitDepth::F32)
    }

    /// Create a WAV encoder with an explicit sample format
    pub fn with_bit_depth<P: AsRef<Path>>(
        path: P,
        sample_rate: u32,
        channels: Channels,
        bit_depth: BitDepth,
    ) -> AudioResult<Self> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate { rate: 0 });
        }

        let spec = WavSpec {
            channels: channels.count() as u16,
            sample_rate,
            bits_per_sample: bit_depth.bits(),
            sample_format: match bit_depth {
                BitDepth::I16 => SampleFormat::Int,
                BitDepth::F32 => SampleFormat::Float,
            },
        };

        let writer = WavWriter::create(path, spec)?;

        Ok(WavEncoder {
            writer: Some(writer),
            sample_rate,
            channels,
            bit_depth,
        })
    }

    /// Get the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the channel configuration
    pub fn channels(&self) -> Channels {
        self.channels
    }

    /// Get the number of samples written (all channels)
    pub fn samples_written(&self) -> u32 {
        self.writer.as_ref().map(|w| w.len()).unwrap_or(0)
    }
}

impl super::Encoder for WavEncoder {
    fn encode(&mut self, buffer: &AudioBuffer) -> AudioResult<()> {
        if buffer.sample_rate() != self.sample_rate {
            return Err(AudioError::InvalidSampleRate {
                rate: buffer.sample_rate(),
            });
        }

        if buffer.channels() != self.channels {
            return Err(AudioError::InvalidChannels {
                expected: self.channels.count(),
                got: buffer.channels().count(),
            });
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| AudioError::EncodeError("Encoder already finalized".to_string()))?;

        for sample in buffer.to_interleaved() {
            match self.bit_depth {
                BitDepth::F32 => writer.write_sample(sample)?,
                BitDepth::I16 => {
                    let scaled = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
                    writer.write_sample(scaled)?
                }
            }
        }

        Ok(())
    }

    fn finalize(&mut self) -> AudioResult<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use tempfile::NamedTempFile;

    #[test]
    fn test_wav_encoder_write() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut encoder = WavEncoder::new(temp_file.path(), 44100, Channels::Mono).unwrap();

        let buffer = AudioBuffer::mono(vec![0.0, 0.1, -0.1, 0.5], 44100).unwrap();
        assert!(encoder.encode(&buffer).is_ok());
        assert_eq!(encoder.samples_written(), 4);
        assert!(encoder.finalize().is_ok());
        assert!(encoder.encode(&buffer).is_err());
    }

    #[test]
    fn test_wav_encoder_pcm16() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut encoder =
            WavEncoder::with_bit_depth(temp_file.path(), 8000, Channels::Stereo, BitDepth::I16)
                .unwrap();
        let buffer = AudioBuffer::new(vec![vec![1.5, -0.5], vec![0.0, 0.25]], 8000).unwrap();
        encoder.encode(&buffer).unwrap();
        encoder.finalize().unwrap();

        let reader = hound::WavReader::open(temp_file.path()).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 16);
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples[0], i16::MAX);
        assert_eq!(samples.len(), 4);
    }

    #[test]
    fn test_wav_encoder_invalid_sample_rate() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut encoder = WavEncoder::new(temp_file.path(), 44100, Channels::Mono).unwrap();
        let buffer = AudioBuffer::mono(vec![0.0, 0.1], 48000).unwrap();
        assert!(encoder.encode(&buffer).is_err());
    }

    #[test]
    fn test_wav_encoder_invalid_channels() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut encoder = WavEncoder::new(temp_file.path(), 44100, Channels::Mono).unwrap();
        let buffer = AudioBuffer::new(vec![vec![0.0, 0.1], vec![0.2, 0.3]], 44100).unwrap();
        assert!(encoder.encode(&buffer).is_err());
    }
}
