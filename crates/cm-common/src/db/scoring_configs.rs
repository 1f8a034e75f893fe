use chrono::Utc;
use deadpool_postgres::PoolError;
use tokio_postgres::{Error as PgError, Row};
use tracing::instrument;

use crate::db::PgPool;
use crate::scoring::weights::{ScoringWeights, DEFAULT_WEIGHTS};

#[derive(Debug, thiserror::Error)]
pub enum ScoringConfigError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
    #[error("invalid weights: {0}")]
    InvalidWeights(String),
}

/// Per-organization scoring settings. Organizations without a stored row get
/// the documented defaults; rows are only created when an admin saves.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub organization_id: i64,
    pub enabled: bool,
    pub auto_score: bool,
    pub weights: ScoringWeights,
}

impl ScoringConfig {
    pub fn defaults_for(organization_id: i64) -> Self {
        Self {
            organization_id,
            enabled: true,
            auto_score: true,
            weights: DEFAULT_WEIGHTS,
        }
    }
}

fn row_to_config(row: &Row) -> Result<ScoringConfig, ScoringConfigError> {
    Ok(ScoringConfig {
        organization_id: row.try_get("organization_id")?,
        enabled: row.try_get("enabled")?,
        auto_score: row.try_get("auto_score")?,
        weights: ScoringWeights {
            skill: row.try_get("skill_weight")?,
            experience: row.try_get("experience_weight")?,
            semantic: row.try_get("semantic_weight")?,
        },
    })
}

/// Stored config for the organization, or the documented defaults when no
/// row exists.
#[instrument(skip(pool))]
pub async fn fetch_scoring_config(
    pool: &PgPool,
    organization_id: i64,
) -> Result<ScoringConfig, ScoringConfigError> {
    let client = pool.get().await?;

    let row = client
        .query_opt(
            "SELECT organization_id, enabled, auto_score, skill_weight, experience_weight, semantic_weight
             FROM ats.scoring_configs WHERE organization_id = $1",
            &[&organization_id],
        )
        .await?;

    match row {
        Some(row) => row_to_config(&row),
        None => Ok(ScoringConfig::defaults_for(organization_id)),
    }
}

/// Store the organization's config. Weights must be finite, non-negative and
/// not all zero; the sum=100 convention is left to the UI.
#[instrument(skip(pool, config), fields(organization_id = config.organization_id))]
pub async fn upsert_scoring_config(
    pool: &PgPool,
    config: &ScoringConfig,
) -> Result<ScoringConfig, ScoringConfigError> {
    if !config.weights.is_valid() {
        return Err(ScoringConfigError::InvalidWeights(format!(
            "weights must be finite, non-negative and sum to a positive total (got {:?})",
            config.weights
        )));
    }

    let client = pool.get().await?;

    let stmt = client
        .prepare(
            "INSERT INTO ats.scoring_configs (
                organization_id,
                enabled,
                auto_score,
                skill_weight,
                experience_weight,
                semantic_weight,
                updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7
            )
            ON CONFLICT (organization_id) DO UPDATE SET
                enabled = EXCLUDED.enabled,
                auto_score = EXCLUDED.auto_score,
                skill_weight = EXCLUDED.skill_weight,
                experience_weight = EXCLUDED.experience_weight,
                semantic_weight = EXCLUDED.semantic_weight,
                updated_at = EXCLUDED.updated_at
            RETURNING organization_id, enabled, auto_score, skill_weight, experience_weight, semantic_weight;",
        )
        .await?;

    let row = client
        .query_one(
            &stmt,
            &[
                &config.organization_id,
                &config.enabled,
                &config.auto_score,
                &config.weights.skill,
                &config.weights.experience,
                &config.weights.semantic,
                &Utc::now(),
            ],
        )
        .await?;

    row_to_config(&row)
}

/// Organizations whose new applications should be scored automatically.
#[instrument(skip(pool))]
pub async fn fetch_auto_score_organization_ids(
    pool: &PgPool,
) -> Result<Vec<i64>, ScoringConfigError> {
    let client = pool.get().await?;

    let rows = client
        .query(
            "SELECT organization_id FROM ats.scoring_configs
             WHERE enabled AND auto_score
             ORDER BY organization_id",
            &[],
        )
        .await?;

    Ok(rows.iter().map(|row| row.get("organization_id")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ScoringConfig::defaults_for(42);
        assert_eq!(config.organization_id, 42);
        assert!(config.enabled);
        assert!(config.auto_score);
        assert_eq!(config.weights.skill, 40.0);
        assert_eq!(config.weights.experience, 30.0);
        assert_eq!(config.weights.semantic, 30.0);
    }
}
