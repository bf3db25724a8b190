//! Gender decisions from pitch and timbre

pub mod threshold;
pub mod timbre;

pub use threshold::{WindowThresholds, is_male, local_threshold};
pub use timbre::{
    SEGMENT_PROFILE, STEM_PROFILE, ScoringProfile, TimbreFeatures, TimbreVerdict, score_segment,
    score_stem,
};
