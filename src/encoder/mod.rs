//! Audio encoder implementations

pub mod wav;

pub use wav::WavEncoder;

use crate::core::{AudioBuffer, BitDepth};
use crate::error::AudioResult;
use std::path::Path;

/// Trait for audio encoders
pub trait Encoder {
    /// Encode an audio buffer to output
    fn encode(&mut self, buffer: &AudioBuffer) -> AudioResult<()>;

    /// Finalize encoding (flush any remaining data)
    fn finalize(&mut self) -> AudioResult<()> {
        Ok(())
    }
}

/// Write a buffer to a 32-bit float WAV file
pub fn write_wav<P: AsRef<Path>>(path: P, buffer: &AudioBuffer) -> AudioResult<()> {
    write_wav_as(path, buffer, BitDepth::F32)
}

/// Write a buffer to a WAV file with the given sample format
pub fn write_wav_as<P: AsRef<Path>>(
    path: P,
    buffer: &AudioBuffer,
    bit_depth: BitDepth,
) -> AudioResult<()> {
    let mut encoder =
        WavEncoder::with_bit_depth(path, buffer.sample_rate(), buffer.channels(), bit_depth)?;
    encoder.encode(buffer)?;
    encoder.finalize()
}
