//! Scores one application end to end: config gate, record loading, resume
//! extraction, the two concurrent inference calls, aggregation, persistence.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use super::aggregate::aggregate_overall_score;
use super::analysis::AnalysisProvider;
use super::batch::BatchScorer;
use super::resume::ResumeFetcher;
use super::semantic::{semantic_score, EmbeddingProvider};
use super::text::{build_candidate_text, build_job_text};
use super::ScoringError;
use crate::db::{
    fetch_application_bundle, fetch_scoring_config, fetch_target_application_ids,
    upsert_match_score, MatchScore, MatchScoreInsert, PgPool, ScoreBreakdown,
};

pub struct ScoringPipeline {
    pool: PgPool,
    resumes: ResumeFetcher,
    analysis: Arc<dyn AnalysisProvider>,
    embeddings: Arc<dyn EmbeddingProvider>,
    model_used: String,
}

impl ScoringPipeline {
    pub fn new(
        pool: PgPool,
        resumes: ResumeFetcher,
        analysis: Arc<dyn AnalysisProvider>,
        embeddings: Arc<dyn EmbeddingProvider>,
        model_used: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            resumes,
            analysis,
            embeddings,
            model_used: model_used.into(),
        }
    }

    /// Score one application and persist the result. Nothing is written
    /// unless both inference calls succeed; a missing resume only degrades
    /// the inputs.
    #[instrument(skip(self))]
    pub async fn score_application(
        &self,
        application_id: i64,
        organization_id: i64,
    ) -> Result<MatchScore, ScoringError> {
        let config = fetch_scoring_config(&self.pool, organization_id).await?;
        if !config.enabled {
            return Err(ScoringError::Disabled(organization_id));
        }

        let bundle = fetch_application_bundle(&self.pool, application_id)
            .await?
            .filter(|bundle| bundle.application.organization_id == organization_id)
            .ok_or_else(|| {
                ScoringError::NotFound(format!("application {application_id} not found"))
            })?;

        let resume_text = self
            .resumes
            .fetch_text(bundle.candidate.resume_url.as_deref())
            .await;

        let candidate_text = build_candidate_text(&bundle.candidate, &resume_text);
        let job_text = build_job_text(&bundle.job);

        // Both external calls run concurrently; either failure drops the
        // whole application so no partial score can be written.
        let (analysis, semantic) = tokio::join!(
            self.analysis.analyze(&candidate_text, &job_text),
            semantic_score(self.embeddings.as_ref(), &candidate_text, &job_text),
        );
        let analysis = analysis?;
        let semantic = semantic?;

        let overall = aggregate_overall_score(
            analysis.skill_score,
            analysis.experience_score,
            semantic,
            &config.weights,
        );

        let insert = MatchScoreInsert {
            application_id,
            organization_id,
            candidate_id: bundle.application.candidate_id,
            job_id: bundle.application.job_id,
            overall_score: overall,
            skill_score: analysis.skill_score,
            experience_score: analysis.experience_score,
            semantic_score: semantic,
            ai_summary: analysis.summary,
            recommendation: analysis.recommendation,
            strengths: analysis.strengths,
            concerns: analysis.concerns,
            breakdown: ScoreBreakdown {
                skills_found: analysis.skills_found,
                skills_missing: analysis.skills_missing,
                experience_details: analysis.experience_details,
            },
            weights: config.weights,
            model_used: self.model_used.clone(),
        };

        let saved = upsert_match_score(&self.pool, &insert).await?;

        info!(
            application_id,
            overall_score = saved.overall_score,
            recommendation = saved.recommendation.as_str(),
            "scored application"
        );

        Ok(saved)
    }
}

#[async_trait]
impl BatchScorer for ScoringPipeline {
    async fn target_application_ids(
        &self,
        job_id: i64,
        organization_id: i64,
        rescore: bool,
    ) -> Result<Vec<i64>, ScoringError> {
        Ok(fetch_target_application_ids(&self.pool, job_id, organization_id, rescore).await?)
    }

    async fn score_application(
        &self,
        application_id: i64,
        organization_id: i64,
    ) -> Result<MatchScore, ScoringError> {
        ScoringPipeline::score_application(self, application_id, organization_id).await
    }
}
