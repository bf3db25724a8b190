use crate::core::AudioBuffer;

/// Level at which the clip guard starts scaling
const CLIP_CEILING: f32 = 1.0;

/// Peak the clip guard scales a hot buffer down to
const GUARD_PEAK: f32 = 0.95;

/// Clip guard: buffers peaking above full scale are scaled to 0.95,
/// everything else passes through unchanged
#[derive(Clone, Debug)]
pub struct Normalize {
    target_peak: f32,
}

impl Normalize {
    pub fn clip_guard() -> Self {
        Normalize {
            target_peak: GUARD_PEAK,
        }
    }

    /// Gain this filter would apply to a buffer with the given peak
    pub fn gain_for(&self, peak: f32) -> Option<f32> {
        if peak <= CLIP_CEILING {
            return None;
        }
        Some(self.target_peak / peak)
    }

    /// Apply in place, returning the gain used (if any)
    pub fn apply(&self, buffer: &mut AudioBuffer) -> Option<f32> {
        let gain = self.gain_for(buffer.peak())?;
        buffer.apply_gain(gain);
        Some(gain)
    }
}
