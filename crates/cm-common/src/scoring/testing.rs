//! Hand-rolled test doubles for the scoring seams. Kept in the library (not
//! behind `cfg(test)`) so downstream crates can drive the orchestrator and
//! poller in their own tests without a database or network.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};

use super::analysis::{AnalysisOutcome, AnalysisProvider, Recommendation};
use super::batch::BatchScorer;
use super::poller::ProgressSource;
use super::semantic::EmbeddingProvider;
use super::weights::DEFAULT_WEIGHTS;
use super::ScoringError;
use crate::db::{MatchScore, ScoreBreakdown};

/// A plausible persisted score for fixtures.
pub fn sample_match_score(application_id: i64) -> MatchScore {
    MatchScore {
        id: application_id,
        application_id,
        organization_id: 1,
        candidate_id: application_id,
        job_id: 10,
        overall_score: 77,
        skill_score: 80,
        experience_score: 70,
        semantic_score: 60,
        ai_summary: "Solid fit.".into(),
        recommendation: Recommendation::GoodMatch,
        strengths: vec!["Rust".into()],
        concerns: vec![],
        breakdown: ScoreBreakdown::default(),
        weights: DEFAULT_WEIGHTS,
        model_used: "test-model".into(),
        scored_at: Utc::now(),
    }
}

/// Analysis provider returning the same outcome for every call.
pub struct FixedAnalysis(pub AnalysisOutcome);

#[async_trait]
impl AnalysisProvider for FixedAnalysis {
    async fn analyze(
        &self,
        _candidate_text: &str,
        _job_text: &str,
    ) -> Result<AnalysisOutcome, ScoringError> {
        Ok(self.0.clone())
    }
}

/// Analysis provider that always fails, for isolation tests.
pub struct FailingAnalysis;

#[async_trait]
impl AnalysisProvider for FailingAnalysis {
    async fn analyze(
        &self,
        _candidate_text: &str,
        _job_text: &str,
    ) -> Result<AnalysisOutcome, ScoringError> {
        Err(ScoringError::ExternalService(
            "analysis stub configured to fail".into(),
        ))
    }
}

/// Embedding provider returning a fixed batch of vectors.
pub struct FixedEmbeddings(Vec<Vec<f32>>);

impl FixedEmbeddings {
    pub fn new(vectors: Vec<Vec<f32>>) -> Self {
        Self(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbeddings {
    async fn embed(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, ScoringError> {
        Ok(self.0.clone())
    }
}

/// In-memory `BatchScorer`: a fixed population of applications, a scored
/// set that behaves like the unique-keyed score table, optional per-id
/// failures and an optional gate that holds scoring tasks until released.
pub struct RecordingScorer {
    applications: Vec<i64>,
    fail_ids: HashSet<i64>,
    scored: Mutex<HashMap<i64, MatchScore>>,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingScorer {
    pub fn new(applications: Vec<i64>) -> Self {
        Self {
            applications,
            fail_ids: HashSet::new(),
            scored: Mutex::new(HashMap::new()),
            gate: None,
        }
    }

    /// Make these application ids fail with an external-service error.
    pub fn failing_for(mut self, ids: &[i64]) -> Self {
        self.fail_ids = ids.iter().copied().collect();
        self
    }

    /// Hold every scoring call until [`RecordingScorer::release`].
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(self.applications.len().max(1));
        }
    }

    pub async fn mark_scored(&self, ids: &[i64]) {
        let mut scored = self.scored.lock().await;
        for id in ids {
            scored.insert(*id, sample_match_score(*id));
        }
    }

    pub async fn scored_count(&self) -> usize {
        self.scored.lock().await.len()
    }

    pub async fn is_scored(&self, application_id: i64) -> bool {
        self.scored.lock().await.contains_key(&application_id)
    }

    pub async fn scored_ids(&self) -> Vec<i64> {
        self.scored.lock().await.keys().copied().collect()
    }
}

#[async_trait]
impl BatchScorer for RecordingScorer {
    async fn target_application_ids(
        &self,
        _job_id: i64,
        _organization_id: i64,
        rescore: bool,
    ) -> Result<Vec<i64>, ScoringError> {
        if rescore {
            return Ok(self.applications.clone());
        }

        let scored = self.scored.lock().await;
        Ok(self
            .applications
            .iter()
            .copied()
            .filter(|id| !scored.contains_key(id))
            .collect())
    }

    async fn score_application(
        &self,
        application_id: i64,
        _organization_id: i64,
    ) -> Result<MatchScore, ScoringError> {
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }

        if self.fail_ids.contains(&application_id) {
            return Err(ScoringError::ExternalService(format!(
                "scoring stub configured to fail for application {application_id}"
            )));
        }

        let score = sample_match_score(application_id);
        self.scored
            .lock()
            .await
            .insert(application_id, score.clone());
        Ok(score)
    }
}

/// Progress source that replays a scripted sequence of scored-id sets, then
/// repeats the last one.
#[derive(Clone)]
pub struct SequenceProgress {
    shots: Arc<Mutex<VecDeque<Vec<i64>>>>,
    last: Arc<Mutex<Vec<i64>>>,
    reads: Arc<AtomicUsize>,
}

impl SequenceProgress {
    pub fn new(shots: Vec<Vec<i64>>) -> Self {
        Self {
            shots: Arc::new(Mutex::new(shots.into())),
            last: Arc::new(Mutex::new(Vec::new())),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressSource for SequenceProgress {
    async fn scored_application_ids(&self, _job_id: i64) -> Result<Vec<i64>, ScoringError> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let mut shots = self.shots.lock().await;
        let mut last = self.last.lock().await;
        if let Some(next) = shots.pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }
}
