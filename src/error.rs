use std::io;
use thiserror::Error;

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;

/// Error types for the decode, analysis, compositing and muxing stages
#[derive(Error, Debug)]
pub enum AudioError {
    /// IO error (file operations, disk access)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Unsupported audio format
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Decoding failed
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Encoding failed
    #[error("Encode error: {0}")]
    EncodeError(String),

    /// Resampling operation failed
    #[error("Resampling error: {0}")]
    ResamplingError(String),

    /// Invalid channel configuration
    #[error("Invalid channel configuration: expected {expected}, got {got}")]
    InvalidChannels {
        /// Expected number of channels
        expected: u32,
        /// Got number of channels
        got: u32,
    },

    /// Invalid sample rate
    #[error("Invalid sample rate: {rate}")]
    InvalidSampleRate {
        /// The invalid sample rate
        rate: u32,
    },

    /// Buffer-related error
    #[error("Buffer error: {0}")]
    BufferError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A manual override region is malformed
    #[error("Invalid region {start:.3}s-{end:.3}s: {reason}")]
    InvalidRegion {
        /// Region start in seconds
        start: f64,
        /// Region end in seconds
        end: f64,
        /// Why the region was rejected
        reason: String,
    },

    /// A whole analysis stage produced nothing usable
    #[error("Analysis error: {0}")]
    AnalysisError(String),

    /// An external model required by the selected strategy is not configured
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Speaker separation ran but produced no stems
    #[error("Speaker separation failed: {0}")]
    SeparationFailed(String),

    /// The external media tool is missing
    #[error("{0} not found in PATH")]
    MediaToolNotFound(String),

    /// The external media tool exited unsuccessfully
    #[error("Media tool failed: {message}")]
    MediaToolFailed {
        /// Summary of the failed operation
        message: String,
        /// Captured stderr, if any
        stderr: Option<String>,
        /// Process exit code, if the process exited normally
        exit_code: Option<i32>,
    },

    /// JSON (config, regions, segmenter output) could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AudioError {
    /// Create a media tool failure error.
    pub fn media_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        AudioError::MediaToolFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }
}

impl From<symphonia::core::errors::Error> for AudioError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        AudioError::DecodeError(err.to_string())
    }
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => AudioError::Io(e),
            e => AudioError::EncodeError(e.to_string()),
        }
    }
}

impl From<rubato::ResamplerConstructionError> for AudioError {
    fn from(err: rubato::ResamplerConstructionError) -> Self {
        AudioError::ResamplingError(err.to_string())
    }
}

impl From<rubato::ResampleError> for AudioError {
    fn from(err: rubato::ResampleError) -> Self {
        AudioError::ResamplingError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_failed_message() {
        let err = AudioError::media_failed("remux failed", Some("boom".into()), Some(1));
        assert_eq!(err.to_string(), "Media tool failed: remux failed");
    }
}
