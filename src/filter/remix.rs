use crate::core::{AudioBuffer, Channels};
use crate::error::{AudioError, AudioResult};

/// Audio channel remixer - converts between mono and stereo
pub struct Remix {
    input_channels: Channels,
    output_channels: Channels,
}

impl Remix {
    /// Create a new channel remixer
    pub fn new(input_channels: Channels, output_channels: Channels) -> Self {
        Remix {
            input_channels,
            output_channels,
        }
    }

    /// Remix stereo to mono by averaging channels
    fn stereo_to_mono(left: &[f32], right: &[f32]) -> Vec<f32> {
        left.iter()
            .zip(right)
            .map(|(&l, &r)| (l + r) / 2.0)
            .collect()
    }
}

impl super::Filter for Remix {
    fn process(&mut self, buffer: &AudioBuffer) -> AudioResult<AudioBuffer> {
        if buffer.channels() != self.input_channels {
            return Err(AudioError::InvalidChannels {
                expected: self.input_channels.count(),
                got: buffer.channels().count(),
            });
        }

        let planar = match (self.input_channels, self.output_channels) {
            (src, dst) if src == dst => return Ok(buffer.clone()),
            (Channels::Stereo, Channels::Mono) => {
                vec![Self::stereo_to_mono(buffer.channel(0), buffer.channel(1))]
            }
            // Duplicate to both channels
            (Channels::Mono, Channels::Stereo) => {
                vec![buffer.channel(0).to_vec(), buffer.channel(0).to_vec()]
            }
            _ => unreachable!("mono and stereo pairs are covered above"),
        };

        AudioBuffer::new(planar, buffer.sample_rate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;

    #[test]
    fn test_remix_stereo_to_mono() {
        let input = AudioBuffer::new(vec![vec![0.0, 0.5], vec![1.0, 0.5]], 8000).unwrap();
        let output = Remix::new(Channels::Stereo, Channels::Mono)
            .process(&input)
            .unwrap();

        assert_eq!(output.channels(), Channels::Mono);
        assert!((output.channel(0)[0] - 0.5).abs() < 0.001);
        assert!((output.channel(0)[1] - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_remix_mono_to_stereo() {
        let input = AudioBuffer::mono(vec![0.5, 0.8], 8000).unwrap();
        let output = Remix::new(Channels::Mono, Channels::Stereo)
            .process(&input)
            .unwrap();

        assert_eq!(output.channel(0), &[0.5, 0.8]);
        assert_eq!(output.channel(1), &[0.5, 0.8]);
    }

    #[test]
    fn test_remix_rejects_wrong_input() {
        let input = AudioBuffer::mono(vec![0.5], 8000).unwrap();
        assert!(Remix::new(Channels::Stereo, Channels::Mono).process(&input).is_err());
    }
}
