use chrono::{DateTime, Utc};
use deadpool_postgres::PoolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_postgres::types::Json;
use tokio_postgres::{Error as PgError, Row};
use tracing::instrument;

use crate::db::PgPool;
use crate::scoring::analysis::Recommendation;
use crate::scoring::weights::ScoringWeights;

#[derive(Debug, thiserror::Error)]
pub enum MatchScoreStorageError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
    #[error("failed to map match score row: {0}")]
    Mapping(String),
}

/// Structured part of the score record: what matched, what is missing, and
/// the model's experience notes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    #[serde(default)]
    pub skills_found: Vec<String>,
    #[serde(default)]
    pub skills_missing: Vec<String>,
    #[serde(default)]
    pub experience_details: String,
}

/// Values persisted for one scored application. `scored_at` is assigned at
/// write time.
#[derive(Debug, Clone)]
pub struct MatchScoreInsert {
    pub application_id: i64,
    pub organization_id: i64,
    pub candidate_id: i64,
    pub job_id: i64,
    pub overall_score: u8,
    pub skill_score: u8,
    pub experience_score: u8,
    pub semantic_score: u8,
    pub ai_summary: String,
    pub recommendation: Recommendation,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub breakdown: ScoreBreakdown,
    pub weights: ScoringWeights,
    pub model_used: String,
}

/// One persisted row of `ats.match_scores`.
#[derive(Debug, Clone)]
pub struct MatchScore {
    pub id: i64,
    pub application_id: i64,
    pub organization_id: i64,
    pub candidate_id: i64,
    pub job_id: i64,
    pub overall_score: u8,
    pub skill_score: u8,
    pub experience_score: u8,
    pub semantic_score: u8,
    pub ai_summary: String,
    pub recommendation: Recommendation,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub breakdown: ScoreBreakdown,
    pub weights: ScoringWeights,
    pub model_used: String,
    pub scored_at: DateTime<Utc>,
}

fn parse_recommendation(value: &str) -> Result<Recommendation, MatchScoreStorageError> {
    match value {
        "strong_match" => Ok(Recommendation::StrongMatch),
        "good_match" => Ok(Recommendation::GoodMatch),
        "moderate_match" => Ok(Recommendation::ModerateMatch),
        "weak_match" => Ok(Recommendation::WeakMatch),
        "poor_match" => Ok(Recommendation::PoorMatch),
        other => Err(MatchScoreStorageError::Mapping(format!(
            "unknown recommendation: {other}"
        ))),
    }
}

fn parse_score(row: &Row, column: &str) -> Result<u8, MatchScoreStorageError> {
    let value: i32 = row.try_get(column)?;
    u8::try_from(value)
        .map_err(|_| MatchScoreStorageError::Mapping(format!("{column} out of range: {value}")))
}

fn parse_string_list(value: Value) -> Vec<String> {
    serde_json::from_value(value).unwrap_or_default()
}

fn parse_breakdown(value: Value) -> ScoreBreakdown {
    serde_json::from_value(value).unwrap_or_default()
}

fn parse_weights(value: Value) -> ScoringWeights {
    serde_json::from_value(value).unwrap_or_default()
}

fn row_to_match_score(row: &Row) -> Result<MatchScore, MatchScoreStorageError> {
    Ok(MatchScore {
        id: row.try_get("id")?,
        application_id: row.try_get("application_id")?,
        organization_id: row.try_get("organization_id")?,
        candidate_id: row.try_get("candidate_id")?,
        job_id: row.try_get("job_id")?,
        overall_score: parse_score(row, "overall_score")?,
        skill_score: parse_score(row, "skill_score")?,
        experience_score: parse_score(row, "experience_score")?,
        semantic_score: parse_score(row, "semantic_score")?,
        ai_summary: row.try_get("ai_summary")?,
        recommendation: parse_recommendation(row.try_get::<_, String>("recommendation")?.as_str())?,
        strengths: parse_string_list(row.try_get("strengths")?),
        concerns: parse_string_list(row.try_get("concerns")?),
        breakdown: parse_breakdown(row.try_get("breakdown")?),
        weights: parse_weights(row.try_get("weights")?),
        model_used: row.try_get("model_used")?,
        scored_at: row.try_get("scored_at")?,
    })
}

/// Save-or-replace keyed by `application_id`: the single statement keeps
/// re-scoring atomic, so no partial row is ever visible and concurrent
/// writers for one application serialize on the unique key.
#[instrument(skip(pool, score), fields(application_id = score.application_id))]
pub async fn upsert_match_score(
    pool: &PgPool,
    score: &MatchScoreInsert,
) -> Result<MatchScore, MatchScoreStorageError> {
    let client = pool.get().await?;

    let stmt = client
        .prepare(
            "INSERT INTO ats.match_scores (
                application_id,
                organization_id,
                candidate_id,
                job_id,
                overall_score,
                skill_score,
                experience_score,
                semantic_score,
                ai_summary,
                recommendation,
                strengths,
                concerns,
                breakdown,
                weights,
                model_used,
                scored_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16
            )
            ON CONFLICT (application_id) DO UPDATE SET
                organization_id = EXCLUDED.organization_id,
                candidate_id = EXCLUDED.candidate_id,
                job_id = EXCLUDED.job_id,
                overall_score = EXCLUDED.overall_score,
                skill_score = EXCLUDED.skill_score,
                experience_score = EXCLUDED.experience_score,
                semantic_score = EXCLUDED.semantic_score,
                ai_summary = EXCLUDED.ai_summary,
                recommendation = EXCLUDED.recommendation,
                strengths = EXCLUDED.strengths,
                concerns = EXCLUDED.concerns,
                breakdown = EXCLUDED.breakdown,
                weights = EXCLUDED.weights,
                model_used = EXCLUDED.model_used,
                scored_at = EXCLUDED.scored_at
            RETURNING *;",
        )
        .await?;

    let scored_at = Utc::now();
    let row = client
        .query_one(
            &stmt,
            &[
                &score.application_id,
                &score.organization_id,
                &score.candidate_id,
                &score.job_id,
                &i32::from(score.overall_score),
                &i32::from(score.skill_score),
                &i32::from(score.experience_score),
                &i32::from(score.semantic_score),
                &score.ai_summary,
                &score.recommendation.as_str(),
                &Json(&score.strengths),
                &Json(&score.concerns),
                &Json(&score.breakdown),
                &Json(&score.weights),
                &score.model_used,
                &scored_at,
            ],
        )
        .await?;

    row_to_match_score(&row)
}

#[instrument(skip(pool))]
pub async fn fetch_match_score(
    pool: &PgPool,
    application_id: i64,
) -> Result<Option<MatchScore>, MatchScoreStorageError> {
    let client = pool.get().await?;

    let row = client
        .query_opt(
            "SELECT * FROM ats.match_scores WHERE application_id = $1",
            &[&application_id],
        )
        .await?;

    row.map(|r| row_to_match_score(&r)).transpose()
}

/// All scores for one job, best match first.
#[instrument(skip(pool))]
pub async fn fetch_match_scores_for_job(
    pool: &PgPool,
    job_id: i64,
    organization_id: i64,
) -> Result<Vec<MatchScore>, MatchScoreStorageError> {
    let client = pool.get().await?;

    let rows = client
        .query(
            "SELECT * FROM ats.match_scores
             WHERE job_id = $1 AND organization_id = $2
             ORDER BY overall_score DESC, application_id",
            &[&job_id, &organization_id],
        )
        .await?;

    rows.iter().map(row_to_match_score).collect()
}

/// Application ids that already have a persisted score for the job. This is
/// the read the progress poller relies on.
#[instrument(skip(pool))]
pub async fn fetch_scored_application_ids(
    pool: &PgPool,
    job_id: i64,
) -> Result<Vec<i64>, MatchScoreStorageError> {
    let client = pool.get().await?;

    let rows = client
        .query(
            "SELECT application_id FROM ats.match_scores WHERE job_id = $1",
            &[&job_id],
        )
        .await?;

    Ok(rows.iter().map(|row| row.get("application_id")).collect())
}
