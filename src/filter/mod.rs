//! Audio filter implementations

pub mod normalize;
pub mod pitch_shift;
pub mod remix;
pub mod resample;

pub use normalize::Normalize;
pub use pitch_shift::PitchShift;
pub use remix::Remix;
pub use resample::Resample;

use crate::core::AudioBuffer;
use crate::error::AudioResult;

/// Trait for whole-buffer audio filters
pub trait Filter {
    /// Process an audio buffer through this filter
    fn process(&mut self, buffer: &AudioBuffer) -> AudioResult<AudioBuffer>;
}
