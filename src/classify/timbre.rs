//! Multi-feature male-likelihood scoring.
//!
//! Each available feature contributes `tier_score * weight`; the final score is
//! divided by the weights of the features that were actually measured, so a
//! feature that could not be computed neither helps nor hurts.

use crate::analysis::formant::{FormantExtractor, FormantFrame};
use crate::analysis::median;
use crate::analysis::pitch::PitchTracker;
use crate::analysis::spectral::SpectralSummary;
use crate::core::GenderLabel;
use serde::Serialize;

/// Ordered `(upper_bound, score)` tiers with a score for values above all bounds
#[derive(Debug, Clone, Copy)]
pub struct Tiers {
    pub bounds: &'static [(f32, f32)],
    pub otherwise: f32,
}

impl Tiers {
    pub fn score(&self, value: f32) -> f32 {
        self.bounds
            .iter()
            .find(|(upper, _)| value < *upper)
            .map(|(_, score)| *score)
            .unwrap_or(self.otherwise)
    }
}

/// A tiered feature and its weight
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub tiers: Tiers,
    pub weight: f32,
}

/// How formants feed the score
#[derive(Debug, Clone, Copy)]
pub enum FormantRule {
    /// F2/F1 ratio from frames with F1 in `f1_range` and F2 in `f2_range`;
    /// skipped for slices shorter than `min_secs`
    Ratio {
        rule: Rule,
        f1_range: (f32, f32),
        f2_range: (f32, f32),
        min_secs: f64,
    },
    /// Weighted mix of per-formant tier scores for F1, F2 and F3
    Composite {
        f1: Tiers,
        f2: Tiers,
        f3: Tiers,
        mix: [f32; 3],
        weight: f32,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct ScoringProfile {
    pub pitch: Rule,
    /// Pitch only counts with more voiced frames than this
    pub min_voiced_frames: usize,
    pub centroid: Rule,
    pub rolloff: Rule,
    pub mfcc2: Rule,
    pub formant: FormantRule,
    pub max_formant_hz: f32,
    /// Score at or above which the verdict is male
    pub decision: f32,
    /// Inputs quieter than this peak are not scored
    pub silence_peak: Option<f32>,
}

impl ScoringProfile {
    pub fn with_decision(mut self, decision: f32) -> Self {
        self.decision = decision;
        self
    }
}

/// Local double-check of a classifier segment
pub const SEGMENT_PROFILE: ScoringProfile = ScoringProfile {
    pitch: Rule {
        tiers: Tiers {
            bounds: &[(120.0, 1.0), (150.0, 0.6)],
            otherwise: 0.3,
        },
        weight: 0.5,
    },
    min_voiced_frames: 3,
    centroid: Rule {
        tiers: Tiers {
            bounds: &[(1800.0, 1.0), (2500.0, 0.7), (3200.0, 0.4)],
            otherwise: 0.1,
        },
        weight: 2.5,
    },
    rolloff: Rule {
        tiers: Tiers {
            bounds: &[(3500.0, 1.0), (5000.0, 0.7), (6500.0, 0.4)],
            otherwise: 0.1,
        },
        weight: 1.5,
    },
    mfcc2: Rule {
        tiers: Tiers {
            bounds: &[(-5.0, 1.0), (5.0, 0.7), (15.0, 0.4)],
            otherwise: 0.1,
        },
        weight: 1.5,
    },
    formant: FormantRule::Ratio {
        rule: Rule {
            tiers: Tiers {
                bounds: &[(2.2, 1.0), (2.8, 0.6)],
                otherwise: 0.2,
            },
            weight: 1.0,
        },
        f1_range: (200.0, 1200.0),
        f2_range: (500.0, 3000.0),
        min_secs: 0.2,
    },
    max_formant_hz: 5500.0,
    decision: 0.45,
    silence_peak: None,
};

/// Whole-stem voice verdict
pub const STEM_PROFILE: ScoringProfile = ScoringProfile {
    pitch: Rule {
        tiers: Tiers {
            bounds: &[(150.0, 1.0), (180.0, 0.5)],
            otherwise: 0.0,
        },
        weight: 0.5,
    },
    min_voiced_frames: 0,
    centroid: Rule {
        tiers: Tiers {
            bounds: &[(2000.0, 1.0), (2800.0, 0.5)],
            otherwise: 0.0,
        },
        weight: 1.0,
    },
    rolloff: Rule {
        tiers: Tiers {
            bounds: &[(3500.0, 1.0), (5000.0, 0.5)],
            otherwise: 0.0,
        },
        weight: 0.5,
    },
    mfcc2: Rule {
        tiers: Tiers {
            bounds: &[(-5.0, 1.0), (5.0, 0.5)],
            otherwise: 0.0,
        },
        weight: 1.5,
    },
    formant: FormantRule::Composite {
        f1: Tiers {
            bounds: &[(550.0, 1.0), (650.0, 0.5)],
            otherwise: 0.0,
        },
        f2: Tiers {
            bounds: &[(1600.0, 1.0), (1800.0, 0.5)],
            otherwise: 0.0,
        },
        f3: Tiers {
            bounds: &[(2650.0, 1.0), (2900.0, 0.5)],
            otherwise: 0.0,
        },
        mix: [0.4, 0.35, 0.25],
        weight: 3.0,
    },
    max_formant_hz: 5250.0,
    decision: 0.5,
    silence_peak: Some(0.01),
};

/// Measured feature values; `None` when a feature was unavailable
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimbreFeatures {
    pub pitch_hz: Option<f32>,
    pub centroid_hz: Option<f32>,
    pub rolloff_hz: Option<f32>,
    pub mfcc2: Option<f32>,
    pub f1_hz: Option<f32>,
    pub f2_hz: Option<f32>,
    pub f3_hz: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimbreVerdict {
    pub label: GenderLabel,
    pub score: f32,
    pub confidence: f32,
    pub features: TimbreFeatures,
}

impl TimbreVerdict {
    pub fn is_male(&self) -> bool {
        self.label == GenderLabel::Male
    }

    fn from_score(score: f32, decision: f32, features: TimbreFeatures) -> Self {
        TimbreVerdict {
            label: if score >= decision {
                GenderLabel::Male
            } else {
                GenderLabel::Female
            },
            score,
            confidence: (score - 0.5).abs() * 2.0,
            features,
        }
    }
}

/// Running weighted sum over the features that were measured
#[derive(Default)]
struct Tally {
    score: f32,
    weight: f32,
}

impl Tally {
    fn add(&mut self, value: Option<f32>, rule: &Rule) {
        if let Some(v) = value {
            self.score += rule.tiers.score(v) * rule.weight;
            self.weight += rule.weight;
        }
    }

    fn finish(&self) -> f32 {
        if self.weight > 0.0 {
            self.score / self.weight
        } else {
            0.5
        }
    }
}

/// Score a mono slice against `profile`.
///
/// Slices under 0.1 s are reported male with zero confidence, and inputs
/// below the profile's silence gate are `Unknown`.
pub fn score(
    samples: &[f32],
    sample_rate: u32,
    profile: &ScoringProfile,
    formants: Option<&dyn FormantExtractor>,
) -> TimbreVerdict {
    let secs = samples.len() as f64 / sample_rate as f64;

    if let Some(gate) = profile.silence_peak {
        let peak = samples.iter().fold(0.0f32, |a, &b| a.max(b.abs()));
        if peak < gate {
            return TimbreVerdict {
                label: GenderLabel::Unknown,
                score: 0.5,
                confidence: 0.0,
                features: TimbreFeatures::default(),
            };
        }
    }

    if secs < 0.1 {
        return TimbreVerdict {
            label: GenderLabel::Male,
            score: 0.5,
            confidence: 0.0,
            features: TimbreFeatures::default(),
        };
    }

    let mut features = TimbreFeatures::default();
    let mut tally = Tally::default();

    let voiced = PitchTracker::default().voiced_f0(samples, sample_rate);
    if voiced.len() > profile.min_voiced_frames {
        features.pitch_hz = median(&voiced);
    }
    tally.add(features.pitch_hz, &profile.pitch);

    if let Some(summary) = SpectralSummary::analyze(samples, sample_rate) {
        features.centroid_hz = Some(summary.centroid);
        features.rolloff_hz = Some(summary.rolloff);
        features.mfcc2 = summary.mfcc2();
    }
    tally.add(features.centroid_hz, &profile.centroid);
    tally.add(features.rolloff_hz, &profile.rolloff);
    tally.add(features.mfcc2, &profile.mfcc2);

    if let Some(extractor) = formants {
        score_formants(samples, sample_rate, secs, profile, extractor, &mut features, &mut tally);
    }

    TimbreVerdict::from_score(tally.finish(), profile.decision, features)
}

fn score_formants(
    samples: &[f32],
    sample_rate: u32,
    secs: f64,
    profile: &ScoringProfile,
    extractor: &dyn FormantExtractor,
    features: &mut TimbreFeatures,
    tally: &mut Tally,
) {
    if let FormantRule::Ratio { min_secs, .. } = profile.formant {
        if secs <= min_secs {
            return;
        }
    }

    let frames = match extractor.formants(samples, sample_rate, profile.max_formant_hz) {
        Ok(frames) => frames,
        Err(e) => {
            log::warn!("formant analysis failed, scoring without it: {}", e);
            return;
        }
    };

    let collect = |pick: fn(&FormantFrame) -> Option<f32>, range: (f32, f32)| -> Vec<f32> {
        frames
            .iter()
            .filter_map(pick)
            .filter(|f| f.is_finite() && *f > range.0 && *f < range.1)
            .collect()
    };

    match profile.formant {
        FormantRule::Ratio {
            rule,
            f1_range,
            f2_range,
            ..
        } => {
            let f1 = median(&collect(|f| f.f1, f1_range));
            let f2 = median(&collect(|f| f.f2, f2_range));
            if let (Some(f1), Some(f2)) = (f1, f2) {
                features.f1_hz = Some(f1);
                features.f2_hz = Some(f2);
                tally.add(Some(f2 / f1), &rule);
            }
        }
        FormantRule::Composite {
            f1: t1,
            f2: t2,
            f3: t3,
            mix,
            weight,
        } => {
            let positive = (0.0, f32::INFINITY);
            let f1 = median(&collect(|f| f.f1, positive));
            let f2 = median(&collect(|f| f.f2, positive));
            let f3 = median(&collect(|f| f.f3, positive));
            if let (Some(f1), Some(f2), Some(f3)) = (f1, f2, f3) {
                features.f1_hz = Some(f1);
                features.f2_hz = Some(f2);
                features.f3_hz = Some(f3);
                let composite = t1.score(f1) * mix[0] + t2.score(f2) * mix[1] + t3.score(f3) * mix[2];
                tally.score += composite * weight;
                tally.weight += weight;
            }
        }
    }
}

/// Double-check verdict for a classifier segment
pub fn score_segment(
    samples: &[f32],
    sample_rate: u32,
    decision: f32,
    formants: Option<&dyn FormantExtractor>,
) -> TimbreVerdict {
    score(samples, sample_rate, &SEGMENT_PROFILE.with_decision(decision), formants)
}

/// Voice verdict for a whole separated stem
pub fn score_stem(
    samples: &[f32],
    sample_rate: u32,
    decision: f32,
    formants: Option<&dyn FormantExtractor>,
) -> TimbreVerdict {
    score(samples, sample_rate, &STEM_PROFILE.with_decision(decision), formants)
}
