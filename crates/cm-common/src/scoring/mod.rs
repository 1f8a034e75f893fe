pub mod aggregate;
pub mod analysis;
pub mod batch;
pub mod pipeline;
pub mod poller;
pub mod resume;
pub mod semantic;
pub mod testing;
pub mod text;
pub mod weights;

pub use aggregate::aggregate_overall_score;
pub use analysis::{AnalysisOutcome, AnalysisProvider, Recommendation};
pub use batch::{BatchHandle, BatchOrchestrator, BatchScorer};
pub use pipeline::ScoringPipeline;
pub use poller::{poll_until_scored, BatchProgress, PollState, DEFAULT_POLL_INTERVAL};
pub use resume::{ResumeFetcher, RESUME_TEXT_MAX_CHARS};
pub use semantic::{cosine_similarity, rescale_similarity, semantic_score, EmbeddingProvider};
pub use weights::{ScoringWeights, DEFAULT_WEIGHTS};

use crate::db::applications::ApplicationFetchError;
use crate::db::match_scores::MatchScoreStorageError;
use crate::db::scoring_configs::ScoringConfigError;
use crate::llm::InferenceError;

/// Failure taxonomy of the scoring engine. Callers route on the variant:
/// configuration problems are fatal for the call, external-service failures
/// abort a single application only, and a degraded resume is not an error
/// at all.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("scoring is disabled for organization {0}")]
    Disabled(i64),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("a scoring batch is already in flight for job {0}")]
    BatchInFlight(i64),
    #[error("external service error: {0}")]
    ExternalService(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<InferenceError> for ScoringError {
    fn from(value: InferenceError) -> Self {
        match value {
            InferenceError::Configuration(message) => ScoringError::Configuration(message),
            other => ScoringError::ExternalService(other.to_string()),
        }
    }
}

impl From<MatchScoreStorageError> for ScoringError {
    fn from(value: MatchScoreStorageError) -> Self {
        ScoringError::Storage(value.to_string())
    }
}

impl From<ApplicationFetchError> for ScoringError {
    fn from(value: ApplicationFetchError) -> Self {
        ScoringError::Storage(value.to_string())
    }
}

impl From<ScoringConfigError> for ScoringError {
    fn from(value: ScoringConfigError) -> Self {
        match value {
            ScoringConfigError::InvalidWeights(message) => ScoringError::Configuration(message),
            other => ScoringError::Storage(other.to_string()),
        }
    }
}
