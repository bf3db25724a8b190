use crate::core::{GenderLabel, Segment};
use crate::error::{AudioError, AudioResult};
use std::time::Duration;

/// A window of sample indices `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Time-based segment for this span
    pub fn to_segment(&self, label: GenderLabel, sample_rate: u32) -> Segment {
        let sr = sample_rate as f64;
        Segment::new(label, self.start as f64 / sr, self.end as f64 / sr)
    }
}

/// Audio segmentation - split a signal into fixed-length windows
#[derive(Debug, Clone)]
pub struct FixedWindows {
    /// Window duration
    duration: Duration,
    /// Sample rate
    sample_rate: u32,
}

impl FixedWindows {
    /// Create a new splitter
    pub fn new(duration: Duration, sample_rate: u32) -> AudioResult<Self> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate { rate: 0 });
        }

        let windows = FixedWindows {
            duration,
            sample_rate,
        };
        if windows.samples_per_window() == 0 {
            return Err(AudioError::ConfigError(format!(
                "Window of {:?} is shorter than one sample",
                duration
            )));
        }
        Ok(windows)
    }

    /// Number of samples per window (truncated)
    pub fn samples_per_window(&self) -> usize {
        (self.duration.as_secs_f64() * self.sample_rate as f64) as usize
    }

    /// Windows covering `0..total_frames`; the last one may be shorter
    pub fn spans(&self, total_frames: usize) -> Vec<Span> {
        let size = self.samples_per_window();
        (0..total_frames)
            .step_by(size)
            .enumerate()
            .map(|(index, start)| Span {
                index,
                start,
                end: (start + size).min(total_frames),
            })
            .collect()
    }
}
