pub mod score_request;
pub mod score_response;
pub mod scoring_config;

pub use score_request::{BatchScoreRequest, ScoreRequest};
pub use score_response::{BatchTriggerResponse, MatchScoreResponse, ScoreProgressResponse};
pub use scoring_config::{ScoringConfigDto, ScoringWeightsDto};
