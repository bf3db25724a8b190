//! Audio decoder implementations

pub mod symphonia;

pub use symphonia::SymphoniaDecoder;

use crate::core::{AudioBuffer, Channels};
use crate::error::{AudioError, AudioResult};
use crate::filter::{Filter, Remix, Resample};
use std::path::Path;

/// Trait for audio decoders
pub trait Decoder: Send {
    /// Decode the next packet, appending planar samples to `out`.
    ///
    /// Returns `false` once the stream is exhausted.
    fn decode_into(&mut self, out: &mut [Vec<f32>]) -> AudioResult<bool>;

    /// Check if decoder is finished
    fn is_finished(&self) -> bool;

    /// Sample rate and channel layout of the decoded output
    fn layout(&self) -> (u32, Channels);
}

/// Create a decoder from a file path
pub fn from_file<P: AsRef<Path>>(path: P) -> AudioResult<Box<dyn Decoder>> {
    let path = path.as_ref();
    SymphoniaDecoder::from_file(path).map(|d| Box::new(d) as Box<dyn Decoder>)
}

/// Decode a whole file at its native rate and layout.
///
/// A file that decodes to zero frames is reported as an error rather than an
/// empty buffer.
pub fn load_audio<P: AsRef<Path>>(path: P) -> AudioResult<AudioBuffer> {
    let path = path.as_ref();
    let mut decoder = from_file(path)?;
    let (sample_rate, channels) = decoder.layout();

    let mut planar = vec![Vec::new(); channels.count() as usize];
    while decoder.decode_into(&mut planar)? {}

    if planar[0].is_empty() {
        return Err(AudioError::DecodeError(format!(
            "{} contains no audio frames",
            path.display()
        )));
    }

    log::debug!(
        "decoded {}: {} frames, {} Hz, {}",
        path.display(),
        planar[0].len(),
        sample_rate,
        channels.name()
    );
    AudioBuffer::new(planar, sample_rate)
}

/// Decode a file and convert it to `sample_rate` and `channels`
pub fn load_audio_as<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: Channels,
) -> AudioResult<AudioBuffer> {
    let audio = load_audio(path)?;
    let audio = Remix::new(audio.channels(), channels).process(&audio)?;
    Resample::new(audio.sample_rate(), sample_rate)?.process(&audio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::write_wav;
    use tempfile::tempdir;

    #[test]
    fn test_load_audio_as_converts_layout_and_rate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let samples: Vec<f32> = (0..16000).map(|i| (i as f32 * 0.05).sin() * 0.3).collect();
        write_wav(&path, &AudioBuffer::mono(samples, 16000).unwrap()).unwrap();

        let loaded = load_audio_as(&path, 44100, Channels::Stereo).unwrap();
        assert_eq!(loaded.sample_rate(), 44100);
        assert_eq!(loaded.channels(), Channels::Stereo);
        assert_eq!(loaded.frames(), 44100);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_audio("/nonexistent/input.wav").is_err());
    }
}
