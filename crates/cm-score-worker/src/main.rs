use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use dotenvy::dotenv;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use cm_common::db::{
    create_pool_from_url_checked, fetch_auto_score_organization_ids,
    fetch_jobs_with_unscored_applications, run_migrations, PgPool,
};
use cm_common::llm::InferenceClient;
use cm_common::logging::{init_tracing_subscriber, install_tracing_panic_hook};
use cm_common::scoring::{BatchOrchestrator, ResumeFetcher, ScoringError, ScoringPipeline};

#[derive(Debug, Parser)]
#[command(
    name = "cm-score-worker",
    about = "Automatically score new applications for organizations with auto-score enabled"
)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    db_url: String,

    /// Worker id recorded in logs
    #[arg(long, default_value = "cm-score-worker")]
    worker_id: String,

    /// Optional cap on how many batches to trigger in one run (default: run forever)
    #[arg(long)]
    max_batches: Option<usize>,

    /// Exit when no organization has unscored applications (default: keep polling)
    #[arg(long, default_value_t = false)]
    exit_on_empty: bool,

    /// Idle poll interval in milliseconds between discovery cycles
    #[arg(long, default_value_t = 30_000)]
    idle_poll_interval_ms: u64,

    /// Concurrent scoring tasks per batch
    #[arg(
        long,
        env = "CM_SCORE_CONCURRENCY",
        default_value_t = cm_common::scoring::batch::DEFAULT_SCORE_CONCURRENCY
    )]
    score_concurrency: usize,
}

/// Where the worker discovers work: organizations opted into auto-scoring,
/// and their jobs that still have unscored applications.
#[async_trait]
trait AutoScoreSource: Send + Sync {
    async fn auto_score_organizations(&self) -> Result<Vec<i64>, ScoringError>;
    async fn jobs_with_unscored(&self, organization_id: i64) -> Result<Vec<i64>, ScoringError>;
}

struct PgAutoScoreSource {
    pool: PgPool,
}

#[async_trait]
impl AutoScoreSource for PgAutoScoreSource {
    async fn auto_score_organizations(&self) -> Result<Vec<i64>, ScoringError> {
        Ok(fetch_auto_score_organization_ids(&self.pool).await?)
    }

    async fn jobs_with_unscored(&self, organization_id: i64) -> Result<Vec<i64>, ScoringError> {
        Ok(fetch_jobs_with_unscored_applications(&self.pool, organization_id).await?)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct CycleOutcome {
    batches_triggered: usize,
    applications_targeted: usize,
}

/// One discovery cycle: trigger an automatic batch for every job with
/// unscored applications and wait for each batch to settle. Failures to
/// trigger one job never abort the cycle.
async fn run_cycle(
    source: &dyn AutoScoreSource,
    orchestrator: &Arc<BatchOrchestrator>,
) -> Result<CycleOutcome, ScoringError> {
    let mut outcome = CycleOutcome::default();

    for organization_id in source.auto_score_organizations().await? {
        for job_id in source.jobs_with_unscored(organization_id).await? {
            match orchestrator.trigger(job_id, organization_id, false).await {
                Ok(mut handle) => {
                    outcome.batches_triggered += 1;
                    outcome.applications_targeted += handle.targeted;

                    // Settle before planning more work; overlapping cycles
                    // would re-target the same applications.
                    while !*handle.settled.borrow() {
                        if handle.settled.changed().await.is_err() {
                            break;
                        }
                    }
                }
                Err(ScoringError::BatchInFlight(_)) => {
                    info!(job_id, "batch already in flight; skipping");
                }
                Err(err) => {
                    warn!(
                        job_id,
                        organization_id,
                        error = %err,
                        "failed to trigger batch; cycle continues"
                    );
                }
            }
        }
    }

    Ok(outcome)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_tracing_subscriber("cm-score-worker");
    install_tracing_panic_hook(env!("CARGO_PKG_NAME"));
    cm_metrics::init_metrics("CM_METRICS_PORT", 9465);

    let args = Cli::parse();
    let pool = create_pool_from_url_checked(&args.db_url).await?;
    run_migrations(&pool).await?;

    let inference = Arc::new(InferenceClient::from_env()?);
    let model_used = inference.model_identifier();
    let pipeline = Arc::new(ScoringPipeline::new(
        pool.clone(),
        ResumeFetcher::new(),
        inference.clone(),
        inference,
        model_used,
    ));
    let orchestrator = Arc::new(BatchOrchestrator::new(
        pipeline,
        args.score_concurrency.max(1),
    ));
    let source = PgAutoScoreSource { pool: pool.clone() };

    let status = pool.status();
    info!(
        size = status.size,
        available = status.available,
        worker_id = %args.worker_id,
        idle_poll_interval_ms = args.idle_poll_interval_ms,
        score_concurrency = args.score_concurrency,
        "created postgres connection pool for score worker",
    );

    let mut triggered = 0usize;
    let max_batches = args.max_batches.unwrap_or(usize::MAX);

    loop {
        let outcome = run_cycle(&source, &orchestrator).await?;
        triggered += outcome.batches_triggered;

        if outcome.batches_triggered > 0 {
            info!(
                batches = outcome.batches_triggered,
                applications = outcome.applications_targeted,
                total_triggered = triggered,
                "cycle finished"
            );
        }

        if triggered >= max_batches {
            break;
        }

        if outcome.batches_triggered == 0 {
            if args.exit_on_empty {
                if triggered == 0 {
                    info!("no pending scoring work found; exiting");
                }
                break;
            }

            sleep(Duration::from_millis(args.idle_poll_interval_ms)).await;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("cm-score-worker failed: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm_common::scoring::testing::RecordingScorer;

    struct StaticSource {
        organizations: Vec<i64>,
        jobs: Vec<i64>,
    }

    #[async_trait]
    impl AutoScoreSource for StaticSource {
        async fn auto_score_organizations(&self) -> Result<Vec<i64>, ScoringError> {
            Ok(self.organizations.clone())
        }

        async fn jobs_with_unscored(&self, _organization_id: i64) -> Result<Vec<i64>, ScoringError> {
            Ok(self.jobs.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl AutoScoreSource for FailingSource {
        async fn auto_score_organizations(&self) -> Result<Vec<i64>, ScoringError> {
            Err(ScoringError::Storage("db unavailable".into()))
        }

        async fn jobs_with_unscored(&self, _organization_id: i64) -> Result<Vec<i64>, ScoringError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn cycle_scores_every_unscored_application() {
        let scorer = Arc::new(RecordingScorer::new(vec![1, 2, 3]));
        let orchestrator = Arc::new(BatchOrchestrator::new(
            Arc::clone(&scorer) as Arc<dyn cm_common::scoring::BatchScorer>,
            2,
        ));
        let source = StaticSource {
            organizations: vec![1],
            jobs: vec![10],
        };

        let outcome = run_cycle(&source, &orchestrator).await.unwrap();

        assert_eq!(outcome.batches_triggered, 1);
        assert_eq!(outcome.applications_targeted, 3);
        assert_eq!(scorer.scored_count().await, 3);
    }

    #[tokio::test]
    async fn cycle_with_no_work_is_empty() {
        let scorer = Arc::new(RecordingScorer::new(vec![]));
        let orchestrator = Arc::new(BatchOrchestrator::new(
            Arc::clone(&scorer) as Arc<dyn cm_common::scoring::BatchScorer>,
            2,
        ));
        let source = StaticSource {
            organizations: vec![],
            jobs: vec![],
        };

        let outcome = run_cycle(&source, &orchestrator).await.unwrap();
        assert_eq!(outcome, CycleOutcome::default());
    }

    #[tokio::test]
    async fn in_flight_batches_are_skipped_not_errors() {
        let scorer = Arc::new(RecordingScorer::new(vec![1, 2]).gated());
        let orchestrator = Arc::new(BatchOrchestrator::new(
            Arc::clone(&scorer) as Arc<dyn cm_common::scoring::BatchScorer>,
            2,
        ));

        // Something else (the API, say) already started a batch for job 10.
        let mut external = orchestrator.trigger(10, 1, false).await.unwrap();

        let source = StaticSource {
            organizations: vec![1],
            jobs: vec![10],
        };
        let outcome = run_cycle(&source, &orchestrator).await.unwrap();
        assert_eq!(outcome.batches_triggered, 0);

        scorer.release();
        while !*external.settled.borrow() {
            if external.settled.changed().await.is_err() {
                break;
            }
        }
    }

    #[tokio::test]
    async fn discovery_failures_surface_to_the_run_loop() {
        let scorer = Arc::new(RecordingScorer::new(vec![1]));
        let orchestrator = Arc::new(BatchOrchestrator::new(
            Arc::clone(&scorer) as Arc<dyn cm_common::scoring::BatchScorer>,
            2,
        ));

        let result = run_cycle(&FailingSource, &orchestrator).await;
        assert!(matches!(result, Err(ScoringError::Storage(_))));
    }
}
