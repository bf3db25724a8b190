use crate::core::AudioBuffer;
use crate::error::{AudioError, AudioResult};
use rubato::{FftFixedInOut, Resampler};

const CHUNK_SIZE: usize = 1024;

/// Audio resampler - converts from one sample rate to another
///
/// Uses rubato's synchronous FFT resampler. The output is trimmed by the
/// resampler's delay so it lines up with the input, and its length is exactly
/// `round(frames * output_rate / input_rate)`.
pub struct Resample {
    input_rate: u32,
    output_rate: u32,
}

impl Resample {
    /// Create a new resampler
    ///
    /// # Arguments
    /// * `input_rate` - Input sample rate in Hz
    /// * `output_rate` - Output sample rate in Hz
    pub fn new(input_rate: u32, output_rate: u32) -> AudioResult<Self> {
        if input_rate == 0 || output_rate == 0 {
            return Err(AudioError::InvalidSampleRate { rate: 0 });
        }

        Ok(Resample {
            input_rate,
            output_rate,
        })
    }

    /// Get the input sample rate
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Get the output sample rate
    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Get the ratio of output to input sample rate
    pub fn ratio(&self) -> f64 {
        self.output_rate as f64 / self.input_rate as f64
    }

    /// Number of output frames produced for `frames` input frames
    pub fn output_len(&self, frames: usize) -> usize {
        (frames as f64 * self.ratio()).round() as usize
    }

    fn resample_planar(&self, input: &[Vec<f32>]) -> AudioResult<Vec<Vec<f32>>> {
        let channels = input.len();
        let frames = input[0].len();
        let expected = self.output_len(frames);

        let mut resampler = FftFixedInOut::<f32>::new(
            self.input_rate as usize,
            self.output_rate as usize,
            CHUNK_SIZE,
            channels,
        )?;
        let delay = resampler.output_delay();
        let wanted = expected + delay;

        let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(wanted); channels];
        let append = |output: &mut Vec<Vec<f32>>, chunk: Vec<Vec<f32>>| {
            for (dst, src) in output.iter_mut().zip(chunk) {
                dst.extend_from_slice(&src);
            }
        };

        let mut pos = 0;
        while pos + resampler.input_frames_next() <= frames {
            let end = pos + resampler.input_frames_next();
            let chunk: Vec<&[f32]> = input.iter().map(|c| &c[pos..end]).collect();
            append(&mut output, resampler.process(&chunk, None)?);
            pos = end;
        }

        if pos < frames {
            let chunk: Vec<&[f32]> = input.iter().map(|c| &c[pos..]).collect();
            append(&mut output, resampler.process_partial(Some(chunk.as_slice()), None)?);
        }

        // Flush the delay line
        while output[0].len() < wanted {
            let tail = resampler.process_partial::<&[f32]>(None, None)?;
            if tail.first().is_none_or(|c| c.is_empty()) {
                break;
            }
            append(&mut output, tail);
        }

        for channel in &mut output {
            channel.drain(..delay.min(channel.len()));
            channel.resize(expected, 0.0);
        }
        Ok(output)
    }
}

impl super::Filter for Resample {
    fn process(&mut self, buffer: &AudioBuffer) -> AudioResult<AudioBuffer> {
        if buffer.sample_rate() != self.input_rate {
            return Err(AudioError::InvalidSampleRate {
                rate: buffer.sample_rate(),
            });
        }

        if self.input_rate == self.output_rate {
            // No resampling needed
            return Ok(buffer.clone());
        }

        if buffer.is_empty() {
            return AudioBuffer::new(vec![Vec::new(); buffer.channel_count()], self.output_rate);
        }

        let planar = self.resample_planar(buffer.planar())?;
        AudioBuffer::new(planar, self.output_rate)
    }
}

/// Read `input` at fractional positions `i * step` by linear interpolation.
///
/// Produces `len` samples; positions past the end hold the last sample.
pub fn linear_interpolate(input: &[f32], step: f64, len: usize) -> Vec<f32> {
    if input.is_empty() {
        return vec![0.0; len];
    }

    let last = input.len() - 1;
    (0..len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = pos.floor() as usize;
            if idx >= last {
                return input[last];
            }
            let frac = pos - idx as f64;
            (input[idx] as f64 * (1.0 - frac) + input[idx + 1] as f64 * frac) as f32
        })
        .collect()
}
