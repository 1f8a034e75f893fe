use super::weights::ScoringWeights;

/// Exponent of the upward curve applied to the weighted mean. Values below
/// 1.0 lift mid-range scores while keeping 0 and 100 fixed.
const SCORE_CURVE_EXPONENT: f64 = 0.75;

/// Combine the three sub-scores into the overall 0-100 match score.
///
/// `raw = Σ(score·weight) / Σweight`, then `curved = 100·(raw/100)^0.75`,
/// rounded and clamped. A zero weight total yields 0 rather than dividing
/// by zero.
pub fn aggregate_overall_score(
    skill_score: u8,
    experience_score: u8,
    semantic_score: u8,
    weights: &ScoringWeights,
) -> u8 {
    let total = weights.total();
    if total <= 0.0 || !total.is_finite() {
        return 0;
    }

    let raw = (f64::from(skill_score) * weights.skill
        + f64::from(experience_score) * weights.experience
        + f64::from(semantic_score) * weights.semantic)
        / total;

    let curved = 100.0 * (raw / 100.0).powf(SCORE_CURVE_EXPONENT);
    curved.clamp(0.0, 100.0).round() as u8
}

/// Clamp an arbitrary model-reported score into the 0-100 range.
pub fn clamp_score(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(skill: f64, experience: f64, semantic: f64) -> ScoringWeights {
        ScoringWeights {
            skill,
            experience,
            semantic,
        }
    }

    #[test]
    fn endpoints_are_preserved() {
        let w = weights(40.0, 30.0, 30.0);
        assert_eq!(aggregate_overall_score(100, 100, 100, &w), 100);
        assert_eq!(aggregate_overall_score(0, 0, 0, &w), 0);
    }

    #[test]
    fn endpoints_hold_for_any_positive_weights() {
        for w in [
            weights(1.0, 1.0, 1.0),
            weights(99.0, 0.5, 0.5),
            weights(0.0, 0.0, 7.0),
        ] {
            assert_eq!(aggregate_overall_score(100, 100, 100, &w), 100);
            assert_eq!(aggregate_overall_score(0, 0, 0, &w), 0);
        }
    }

    #[test]
    fn reference_scenario_matches_contract() {
        // raw = (80*40 + 70*30 + 60*30) / 100 = 71.0
        // curved = 100 * 0.71^0.75 ≈ 77.35 → 77
        let w = weights(40.0, 30.0, 30.0);
        assert_eq!(aggregate_overall_score(80, 70, 60, &w), 77);
    }

    #[test]
    fn zero_total_weight_falls_back_to_zero() {
        let w = weights(0.0, 0.0, 0.0);
        assert_eq!(aggregate_overall_score(80, 70, 60, &w), 0);
    }

    #[test]
    fn curve_lifts_mid_range_scores() {
        let w = weights(40.0, 30.0, 30.0);
        // Equal sub-scores make the weighted mean exact; the curve should
        // push a 50 upward.
        let overall = aggregate_overall_score(50, 50, 50, &w);
        assert!(overall > 50);
        assert_eq!(overall, 59); // 100 * 0.5^0.75 ≈ 59.46 → 59
    }

    #[test]
    fn output_stays_in_range_across_grid() {
        let w = weights(40.0, 30.0, 30.0);
        for skill in (0..=100).step_by(10) {
            for experience in (0..=100).step_by(10) {
                for semantic in (0..=100).step_by(10) {
                    let overall = aggregate_overall_score(skill, experience, semantic, &w);
                    assert!(overall <= 100);
                }
            }
        }
    }

    #[test]
    fn normalization_makes_scaled_weights_equivalent() {
        let convention = weights(40.0, 30.0, 30.0);
        let scaled = weights(4.0, 3.0, 3.0);
        assert_eq!(
            aggregate_overall_score(83, 61, 42, &convention),
            aggregate_overall_score(83, 61, 42, &scaled),
        );
    }

    #[test]
    fn clamp_score_bounds_model_output() {
        assert_eq!(clamp_score(-5), 0);
        assert_eq!(clamp_score(42), 42);
        assert_eq!(clamp_score(250), 100);
    }
}
