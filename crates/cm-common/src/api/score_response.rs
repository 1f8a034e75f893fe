use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{MatchScore, ScoreBreakdown};
use crate::scoring::analysis::Recommendation;
use crate::scoring::weights::ScoringWeights;

/// GUI-facing view of one persisted match score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchScoreResponse {
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
    /// Snapshot of the weights the score was computed with, for audit.
    pub weights: ScoringWeights,
    pub model_used: String,
    pub scored_at: DateTime<Utc>,
}

impl From<MatchScore> for MatchScoreResponse {
    fn from(score: MatchScore) -> Self {
        Self {
            application_id: score.application_id,
            organization_id: score.organization_id,
            candidate_id: score.candidate_id,
            job_id: score.job_id,
            overall_score: score.overall_score,
            skill_score: score.skill_score,
            experience_score: score.experience_score,
            semantic_score: score.semantic_score,
            ai_summary: score.ai_summary,
            recommendation: score.recommendation,
            strengths: score.strengths,
            concerns: score.concerns,
            breakdown: score.breakdown,
            weights: score.weights,
            model_used: score.model_used,
            scored_at: score.scored_at,
        }
    }
}

/// Returned by the batch trigger endpoint: the batch runs in the background,
/// this is everything the caller needs to start polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTriggerResponse {
    pub batch_run_id: String,
    pub targeted: usize,
}

/// Snapshot of batch progress computed from persisted scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreProgressResponse {
    pub total: usize,
    pub scored: usize,
    pub settled: bool,
}
