use crate::core::Channels;
use crate::error::{AudioError, AudioResult};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Symphonia-based audio decoder
pub struct SymphoniaDecoder {
    /// Current reader for the audio source
    reader: Box<dyn FormatReader>,
    /// Track information
    track_id: u32,
    /// Sample rate
    sample_rate: u32,
    /// Number of channels
    channels: Channels,
    /// Whether decoding is finished
    finished: bool,
    /// Current decoder state
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    /// Reusable conversion buffer, sized on the first packet
    sample_buf: Option<SampleBuffer<f32>>,
}

impl SymphoniaDecoder {
    /// Create decoder from file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> AudioResult<Self> {
        let path = path.as_ref();

        let file = Box::new(File::open(path)?);
        let mss = MediaSourceStream::new(file, Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?;

        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::UnsupportedFormat("No audio track found".to_string()))?
            .clone();

        let codec_params = &track.codec_params;

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| AudioError::DecodeError("Unknown sample rate".to_string()))?;

        // More than two channels are folded to stereo by the caller after decode
        let channel_count = codec_params
            .channels
            .map(|c| c.count() as u32)
            .ok_or_else(|| AudioError::DecodeError("Unknown channel count".to_string()))?;
        let channels = if channel_count == 1 {
            Channels::Mono
        } else {
            Channels::Stereo
        };

        let decoder = symphonia::default::get_codecs()
            .make(codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?;

        Ok(SymphoniaDecoder {
            reader,
            track_id: track.id,
            sample_rate,
            channels,
            finished: false,
            decoder,
            sample_buf: None,
        })
    }

    /// Get sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get channels
    pub fn channels(&self) -> Channels {
        self.channels
    }
}

/// Fold an interleaved packet with `source_channels` into the decoder's layout
fn fold_channels(
    layout: Channels,
    interleaved: &[f32],
    source_channels: usize,
    out: &mut [Vec<f32>],
) {
    for frame in interleaved.chunks_exact(source_channels) {
        match layout {
            Channels::Mono => out[0].push(frame.iter().sum::<f32>() / source_channels as f32),
            Channels::Stereo => {
                out[0].push(frame[0]);
                out[1].push(frame[1.min(source_channels - 1)]);
            }
        }
    }
}

impl super::Decoder for SymphoniaDecoder {
    fn decode_into(&mut self, out: &mut [Vec<f32>]) -> AudioResult<bool> {
        if self.finished {
            return Ok(false);
        }

        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.finished = true;
                    return Ok(false);
                }
                Err(symphonia::core::errors::Error::ResetRequired) => {
                    self.finished = true;
                    return Ok(false);
                }
                Err(e) => return Err(AudioError::DecodeError(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                // A corrupt packet is skipped; the stream continues
                Err(symphonia::core::errors::Error::DecodeError(msg)) => {
                    log::warn!("skipping undecodable packet: {}", msg);
                    continue;
                }
                Err(e) => return Err(AudioError::DecodeError(e.to_string())),
            };

            let spec = *decoded.spec();
            let source_channels = spec.channels.count();
            if source_channels == 0 || decoded.frames() == 0 {
                continue;
            }

            let needed_samples = decoded.capacity() * source_channels;
            if self
                .sample_buf
                .as_ref()
                .is_none_or(|buf| buf.capacity() < needed_samples)
            {
                self.sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = self.sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);

            fold_channels(self.channels, buf.samples(), source_channels, out);
            return Ok(true);
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn layout(&self) -> (u32, Channels) {
        (self.sample_rate, self.channels)
    }
}
