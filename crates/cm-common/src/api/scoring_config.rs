use serde::{Deserialize, Serialize};

use crate::db::ScoringConfig;
use crate::scoring::weights::ScoringWeights;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringWeightsDto {
    pub skill: f64,
    pub experience: f64,
    pub semantic: f64,
}

/// Wire shape of a per-organization scoring config, used for both read and
/// write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfigDto {
    pub enabled: bool,
    pub auto_score: bool,
    pub weights: ScoringWeightsDto,
}

impl ScoringConfigDto {
    pub fn into_config(self, organization_id: i64) -> ScoringConfig {
        ScoringConfig {
            organization_id,
            enabled: self.enabled,
            auto_score: self.auto_score,
            weights: ScoringWeights {
                skill: self.weights.skill,
                experience: self.weights.experience,
                semantic: self.weights.semantic,
            },
        }
    }
}

impl From<ScoringConfig> for ScoringConfigDto {
    fn from(config: ScoringConfig) -> Self {
        Self {
            enabled: config.enabled,
            auto_score: config.auto_score,
            weights: ScoringWeightsDto {
                skill: config.weights.skill,
                experience: config.weights.experience,
                semantic: config.weights.semantic,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_between_dto_and_config() {
        let dto = ScoringConfigDto {
            enabled: false,
            auto_score: true,
            weights: ScoringWeightsDto {
                skill: 50.0,
                experience: 20.0,
                semantic: 30.0,
            },
        };

        let config = dto.clone().into_config(9);
        assert_eq!(config.organization_id, 9);
        assert!(!config.enabled);
        assert_eq!(config.weights.skill, 50.0);

        let back = ScoringConfigDto::from(config);
        assert_eq!(back.weights.semantic, dto.weights.semantic);
    }
}
