//! Pipeline configuration

use crate::core::Region;
use crate::error::{AudioError, AudioResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Segmentation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Fixed windows classified by pitch against an adaptive threshold
    Simple,
    /// External gender segmenter refined by smoothing and a timbre double-check
    Timbre,
    /// Speaker separation; a stem is male when both its timbre and pitch say so
    Hybrid,
    /// Speaker separation ranked by pitch alone
    Separation,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Simple => "simple",
            Strategy::Timbre => "timbre",
            Strategy::Hybrid => "hybrid",
            Strategy::Separation => "separation",
        }
    }

    /// Whether the strategy needs the speaker separator
    pub fn uses_separation(&self) -> bool {
        matches!(self, Strategy::Hybrid | Strategy::Separation)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Shift applied to male speech; negative lowers the pitch
    pub pitch_shift_semitones: f64,
    pub strategy: Strategy,
    /// Base pitch below which a voice counts as male
    pub male_threshold_hz: f32,
    /// Window length of the simple strategy
    pub segment_duration_secs: f64,
    /// Length of the adaptive-threshold windows; 0 disables them
    pub adaptive_window_secs: f64,
    /// Segments whose peak stays below this are silent
    pub silence_peak: f32,
    pub crossfade_ms: f64,
    /// Spans shorter than this are never shifted
    pub min_shift_secs: f64,
    /// Classifier blips shorter than this are smoothed away
    pub isolation_min_secs: f64,
    /// Male segments at least this long get a timbre double-check
    pub double_check_min_secs: f64,
    /// Confidence a female double-check verdict needs to override
    pub double_check_confidence: f32,
    pub segment_score_threshold: f32,
    pub stem_score_threshold: f32,
    /// Windows sampled by the long-signal pitch estimate
    pub long_signal_samples: usize,
    /// Working rate of the processed audio
    pub sample_rate: u32,
    /// Rate the speaker separator expects
    pub separation_sample_rate: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            pitch_shift_semitones: -3.0,
            strategy: Strategy::Hybrid,
            male_threshold_hz: 165.0,
            segment_duration_secs: 0.5,
            adaptive_window_secs: 300.0,
            silence_peak: 0.005,
            crossfade_ms: 20.0,
            min_shift_secs: 0.1,
            isolation_min_secs: 0.3,
            double_check_min_secs: 1.0,
            double_check_confidence: 0.3,
            segment_score_threshold: 0.45,
            stem_score_threshold: 0.5,
            long_signal_samples: 20,
            sample_rate: 44100,
            separation_sample_rate: 16000,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config; missing keys take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> AudioResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AudioResult<()> {
        fn fail(message: String) -> AudioResult<()> {
            Err(AudioError::ConfigError(message))
        }

        if !self.pitch_shift_semitones.is_finite() {
            return fail(format!(
                "pitch shift must be finite, got {}",
                self.pitch_shift_semitones
            ));
        }
        if !(self.male_threshold_hz.is_finite() && self.male_threshold_hz > 0.0) {
            return fail(format!(
                "male threshold must be positive, got {}",
                self.male_threshold_hz
            ));
        }

        let positive = [
            ("segment_duration_secs", self.segment_duration_secs),
            ("crossfade_ms", self.crossfade_ms),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return fail(format!("{} must be positive, got {}", name, value));
            }
        }

        let non_negative = [
            ("adaptive_window_secs", self.adaptive_window_secs),
            ("min_shift_secs", self.min_shift_secs),
            ("isolation_min_secs", self.isolation_min_secs),
            ("double_check_min_secs", self.double_check_min_secs),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return fail(format!("{} must not be negative, got {}", name, value));
            }
        }

        let unit = [
            ("silence_peak", self.silence_peak),
            ("double_check_confidence", self.double_check_confidence),
            ("segment_score_threshold", self.segment_score_threshold),
            ("stem_score_threshold", self.stem_score_threshold),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return fail(format!("{} must be within [0, 1], got {}", name, value));
            }
        }

        if self.sample_rate == 0 || self.separation_sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate { rate: 0 });
        }
        if self.long_signal_samples == 0 {
            return fail("long_signal_samples must be at least 1".to_string());
        }

        Ok(())
    }

    /// Crossfade length in seconds
    pub fn crossfade_secs(&self) -> f64 {
        self.crossfade_ms / 1000.0
    }
}

/// Load override regions from a JSON array of `{start, end, semitones?}`
pub fn load_regions<P: AsRef<Path>>(path: P) -> AudioResult<Vec<Region>> {
    let text = std::fs::read_to_string(path)?;
    let regions: Vec<Region> = serde_json::from_str(&text)?;
    for region in &regions {
        region.validate()?;
    }
    Ok(regions)
}
