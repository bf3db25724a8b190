use crate::core::AudioBuffer;
use crate::error::{AudioError, AudioResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tolerance used when comparing segment boundaries in seconds
const BOUNDARY_EPSILON: f64 = 1e-6;

/// Classification assigned to a slice of time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GenderLabel {
    /// Male speech (pitch-shifted)
    Male,
    /// Female speech (left untouched)
    Female,
    /// Silence or near-silence
    NoEnergy,
    /// Music or other non-speech content
    Music,
    /// No confident decision (never shifted)
    Unknown,
}

impl GenderLabel {
    /// Whether the label denotes speech of a known gender
    pub fn is_speech(&self) -> bool {
        matches!(self, GenderLabel::Male | GenderLabel::Female)
    }

    /// Wire name used by external segmenters
    pub fn as_str(&self) -> &'static str {
        match self {
            GenderLabel::Male => "male",
            GenderLabel::Female => "female",
            GenderLabel::NoEnergy => "noEnergy",
            GenderLabel::Music => "music",
            GenderLabel::Unknown => "unknown",
        }
    }
}

impl fmt::Display for GenderLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenderLabel {
    type Err = AudioError;

    fn from_str(s: &str) -> AudioResult<Self> {
        match s.trim() {
            "male" => Ok(GenderLabel::Male),
            "female" => Ok(GenderLabel::Female),
            "noEnergy" | "noenergy" | "noise" | "silence" => Ok(GenderLabel::NoEnergy),
            "music" => Ok(GenderLabel::Music),
            "unknown" => Ok(GenderLabel::Unknown),
            other => Err(AudioError::AnalysisError(format!(
                "unknown segment label '{}'",
                other
            ))),
        }
    }
}

/// A labelled time span `[start, end)` in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Classification of the span
    pub label: GenderLabel,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds (exclusive)
    pub end: f64,
}

impl Segment {
    /// Create a new segment
    pub fn new(label: GenderLabel, start: f64, end: f64) -> Self {
        Segment { label, start, end }
    }

    /// Length of the span in seconds
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Copy of this segment with a different label; bounds are preserved
    pub fn relabel(&self, label: GenderLabel) -> Self {
        Segment { label, ..*self }
    }
}

/// Verify that `segments` are ordered, contiguous and cover `[0, total)`.
pub fn check_coverage(segments: &[Segment], total: f64) -> AudioResult<()> {
    let mut cursor = 0.0;
    for seg in segments {
        if (seg.start - cursor).abs() > BOUNDARY_EPSILON {
            return Err(AudioError::AnalysisError(format!(
                "segment starting at {:.6}s does not follow {:.6}s",
                seg.start, cursor
            )));
        }
        if seg.end < seg.start {
            return Err(AudioError::AnalysisError(format!(
                "segment {:.6}s-{:.6}s ends before it starts",
                seg.start, seg.end
            )));
        }
        cursor = seg.end;
    }
    if (cursor - total).abs() > BOUNDARY_EPSILON {
        return Err(AudioError::AnalysisError(format!(
            "segments cover {:.6}s of {:.6}s",
            cursor, total
        )));
    }
    Ok(())
}

/// Normalise externally produced segments so they satisfy [`check_coverage`].
///
/// Segments are sorted, clipped to `[0, total)`, overlaps are trimmed, and
/// gaps are filled with `Unknown`.
pub fn fill_coverage(mut segments: Vec<Segment>, total: f64) -> Vec<Segment> {
    segments.retain(|s| s.start.is_finite() && s.end.is_finite());
    segments.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut out = Vec::with_capacity(segments.len() + 2);
    let mut cursor = 0.0;
    for seg in segments {
        let start = seg.start.max(cursor);
        let end = seg.end.min(total);
        if end - start <= BOUNDARY_EPSILON {
            continue;
        }
        let start = if start - cursor > BOUNDARY_EPSILON {
            out.push(Segment::new(GenderLabel::Unknown, cursor, start));
            start
        } else {
            cursor
        };
        out.push(Segment::new(seg.label, start, end));
        cursor = end;
    }
    if total - cursor > BOUNDARY_EPSILON {
        out.push(Segment::new(GenderLabel::Unknown, cursor, total));
    } else if let Some(last) = out.last_mut() {
        last.end = total;
    }
    out
}

/// Total seconds carrying `label`
pub fn label_seconds(segments: &[Segment], label: GenderLabel) -> f64 {
    segments
        .iter()
        .filter(|s| s.label == label)
        .map(Segment::duration)
        .sum()
}

/// One source produced by speaker separation
#[derive(Debug, Clone)]
pub struct SpeakerStem {
    /// Stable index of the stem (`speaker_<id>.wav`)
    pub id: usize,
    /// Stem audio at the separation sample rate
    pub audio: AudioBuffer,
    /// Estimated pitch; `0.0` means no reliable pitch was found
    pub estimated_pitch_hz: f64,
    /// Decision of the ranking step
    pub is_male: bool,
}

impl SpeakerStem {
    /// Whether the stem carries a usable pitch estimate
    pub fn has_pitch(&self) -> bool {
        self.estimated_pitch_hz > 0.0
    }
}

/// A caller-chosen span to shift regardless of classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Shift for this region; the run's default shift when absent
    #[serde(default)]
    pub semitones: Option<f64>,
}

impl Region {
    /// Create a region that uses the default shift
    pub fn new(start: f64, end: f64) -> Self {
        Region {
            start,
            end,
            semitones: None,
        }
    }

    /// Set an explicit shift for this region
    pub fn with_semitones(mut self, semitones: f64) -> Self {
        self.semitones = Some(semitones);
        self
    }

    /// Reject negative, inverted or non-finite bounds
    pub fn validate(&self) -> AudioResult<()> {
        let reason = if !self.start.is_finite() || !self.end.is_finite() {
            Some("bounds must be finite")
        } else if self.start < 0.0 {
            Some("start must not be negative")
        } else if self.end <= self.start {
            Some("end must be after start")
        } else if self.semitones.is_some_and(|s| !s.is_finite()) {
            Some("shift must be finite")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(AudioError::InvalidRegion {
                start: self.start,
                end: self.end,
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}
