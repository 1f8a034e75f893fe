pub mod applications;
pub mod match_scores;
pub mod migrations;
pub mod pool;
pub mod scoring_configs;

// Keep re-exports unique so downstream crates see a single symbol per helper.
pub use applications::{
    fetch_application_bundle, fetch_jobs_with_unscored_applications,
    fetch_target_application_ids, ApplicationBundle, ApplicationFetchError,
};
pub use match_scores::{
    fetch_match_score, fetch_match_scores_for_job, fetch_scored_application_ids,
    upsert_match_score, MatchScore, MatchScoreInsert, MatchScoreStorageError, ScoreBreakdown,
};
pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool_from_url, create_pool_from_url_checked, DbPoolError, PgPool};
pub use scoring_configs::{
    fetch_auto_score_organization_ids, fetch_scoring_config, upsert_scoring_config, ScoringConfig,
    ScoringConfigError,
};
