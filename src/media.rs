//! Audio extraction and remuxing through an external media tool.

use crate::core::Channels;
use crate::error::{AudioError, AudioResult};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Pulls audio out of a video container and puts processed audio back
pub trait MediaTool: Send + Sync {
    /// Decode the first audio stream of `video` to 16-bit PCM WAV
    fn extract_audio(&self, video: &Path, wav: &Path, sample_rate: u32, channels: Channels) -> AudioResult<()>;

    /// Copy the video stream of `video` and replace its audio with `audio`,
    /// trimmed to the shorter stream
    fn remux(&self, video: &Path, audio: &Path, output: &Path) -> AudioResult<()>;
}

/// Builder for FFmpeg command lines.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<PathBuf>,
    output: PathBuf,
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            inputs: vec![input.as_ref().to_path_buf()],
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add another `-i` input.
    pub fn input(mut self, input: impl AsRef<Path>) -> Self {
        self.inputs.push(input.as_ref().to_path_buf());
        self
    }

    /// Add an output argument (after the inputs).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Drop the video stream.
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-acodec").output_arg(codec)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn sample_rate(self, rate: u32) -> Self {
        self.output_arg("-ar").output_arg(rate.to_string())
    }

    pub fn channels(self, channels: Channels) -> Self {
        self.output_arg("-ac").output_arg(channels.count().to_string())
    }

    /// Map a stream, e.g. `0:v:0`.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Stop at the end of the shortest stream.
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        for input in &self.inputs {
            args.push("-i".to_string());
            args.push(input.to_string_lossy().to_string());
        }

        args.extend(self.output_args.clone());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// [`MediaTool`] backed by the `ffmpeg` binary
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    binary: PathBuf,
}

impl Ffmpeg {
    /// Locate `ffmpeg` on `PATH`
    pub fn locate() -> AudioResult<Self> {
        let binary =
            which::which("ffmpeg").map_err(|_| AudioError::MediaToolNotFound("ffmpeg".into()))?;
        Ok(Ffmpeg { binary })
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Ffmpeg {
            binary: binary.into(),
        }
    }

    pub fn extract_command(video: &Path, wav: &Path, sample_rate: u32, channels: Channels) -> FfmpegCommand {
        FfmpegCommand::new(video, wav)
            .no_video()
            .audio_codec("pcm_s16le")
            .sample_rate(sample_rate)
            .channels(channels)
    }

    pub fn remux_command(video: &Path, audio: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(video, output)
            .input(audio)
            .video_codec("copy")
            .map("0:v:0")
            .map("1:a:0")
            .shortest()
    }

    /// Run a command to completion.
    pub fn run(&self, cmd: &FfmpegCommand, what: &str) -> AudioResult<()> {
        let args = cmd.build_args();
        log::debug!("{} {}", self.binary.display(), args.join(" "));

        let output = Command::new(&self.binary).args(&args).output()?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        log::warn!("ffmpeg {} failed: {}", what, stderr);
        Err(AudioError::media_failed(
            format!("{} failed", what),
            (!stderr.is_empty()).then_some(stderr),
            output.status.code(),
        ))
    }
}

impl MediaTool for Ffmpeg {
    fn extract_audio(&self, video: &Path, wav: &Path, sample_rate: u32, channels: Channels) -> AudioResult<()> {
        self.run(
            &Self::extract_command(video, wav, sample_rate, channels),
            "audio extraction",
        )
    }

    fn remux(&self, video: &Path, audio: &Path, output: &Path) -> AudioResult<()> {
        self.run(&Self::remux_command(video, audio, output), "remux")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_args() {
        let cmd = Ffmpeg::extract_command(Path::new("in.mp4"), Path::new("a.wav"), 44100, Channels::Stereo);
        assert_eq!(
            cmd.build_args(),
            vec![
                "-y", "-v", "error", "-i", "in.mp4", "-vn", "-acodec", "pcm_s16le", "-ar", "44100",
                "-ac", "2", "a.wav"
            ]
        );
    }

    #[test]
    fn test_remux_args() {
        let cmd = Ffmpeg::remux_command(Path::new("in.mp4"), Path::new("a.wav"), Path::new("out.mp4"));
        assert_eq!(
            cmd.build_args(),
            vec![
                "-y", "-v", "error", "-i", "in.mp4", "-i", "a.wav", "-c:v", "copy", "-map", "0:v:0",
                "-map", "1:a:0", "-shortest", "out.mp4"
            ]
        );
    }

    #[test]
    fn test_log_level() {
        let args = FfmpegCommand::new("a", "b").log_level("info").build_args();
        assert_eq!(&args[..3], &["-y", "-v", "info"]);
    }

    #[test]
    fn test_missing_binary_is_an_error() {
        let ffmpeg = Ffmpeg::with_binary("/nonexistent/ffmpeg");
        let cmd = FfmpegCommand::new("in.mp4", "out.wav");
        assert!(ffmpeg.run(&cmd, "check").is_err());
    }
}
