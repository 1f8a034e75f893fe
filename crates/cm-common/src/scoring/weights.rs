use serde::{Deserialize, Serialize};

/// Default per-organization weights, used whenever no config row exists.
/// The admin UI keeps the triple summing to 100, but the aggregator
/// normalizes by the actual total, so any positive total scores correctly.
pub const DEFAULT_WEIGHTS: ScoringWeights = ScoringWeights {
    skill: 40.0,
    experience: 30.0,
    semantic: 30.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub skill: f64,
    pub experience: f64,
    pub semantic: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}

impl ScoringWeights {
    pub fn total(&self) -> f64 {
        self.skill + self.experience + self.semantic
    }

    /// All components finite and non-negative, with a positive total.
    /// Stored configs must satisfy this; the aggregator itself only needs
    /// the zero-total guard.
    pub fn is_valid(&self) -> bool {
        let components = [self.skill, self.experience, self.semantic];
        components.iter().all(|w| w.is_finite() && *w >= 0.0) && self.total() > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_follow_documented_split() {
        assert_eq!(DEFAULT_WEIGHTS.skill, 40.0);
        assert_eq!(DEFAULT_WEIGHTS.experience, 30.0);
        assert_eq!(DEFAULT_WEIGHTS.semantic, 30.0);
        assert!((DEFAULT_WEIGHTS.total() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn off_convention_totals_are_still_valid() {
        let weights = ScoringWeights {
            skill: 2.0,
            experience: 1.0,
            semantic: 1.0,
        };
        assert!(weights.is_valid());
    }

    #[test]
    fn negative_or_zero_total_weights_are_invalid() {
        let negative = ScoringWeights {
            skill: -1.0,
            experience: 30.0,
            semantic: 30.0,
        };
        assert!(!negative.is_valid());

        let zero = ScoringWeights {
            skill: 0.0,
            experience: 0.0,
            semantic: 0.0,
        };
        assert!(!zero.is_valid());
    }

    #[test]
    fn non_finite_weights_are_invalid() {
        let nan = ScoringWeights {
            skill: f64::NAN,
            experience: 30.0,
            semantic: 30.0,
        };
        assert!(!nan.is_valid());
    }
}
