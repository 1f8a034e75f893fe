//! Batch orchestration: compute the target set, fan the applications out
//! over a bounded pool of scoring tasks, and keep one bad application from
//! sinking the rest.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use super::ScoringError;
use crate::db::MatchScore;
use crate::run_id;

/// Bound on concurrent per-application scoring tasks; keeps the engine
/// inside third-party rate limits.
pub const DEFAULT_SCORE_CONCURRENCY: usize = 4;

/// Seam between the orchestrator and the single-application pipeline.
#[async_trait]
pub trait BatchScorer: Send + Sync + 'static {
    async fn target_application_ids(
        &self,
        job_id: i64,
        organization_id: i64,
        rescore: bool,
    ) -> Result<Vec<i64>, ScoringError>;

    async fn score_application(
        &self,
        application_id: i64,
        organization_id: i64,
    ) -> Result<MatchScore, ScoringError>;
}

/// What a trigger call hands back: enough for the caller to poll progress
/// without waiting on the batch itself.
#[derive(Debug)]
pub struct BatchHandle {
    pub batch_run_id: String,
    pub targeted: usize,
    /// Flips to `true` exactly once, when the batch settles (fully scored or
    /// partially failed; the distinction is in the logs, not here).
    pub settled: watch::Receiver<bool>,
}

type InFlightMap = Arc<Mutex<HashMap<i64, watch::Receiver<bool>>>>;

pub struct BatchOrchestrator {
    scorer: Arc<dyn BatchScorer>,
    concurrency: usize,
    in_flight: InFlightMap,
}

impl BatchOrchestrator {
    pub fn new(scorer: Arc<dyn BatchScorer>, concurrency: usize) -> Self {
        Self {
            scorer,
            concurrency: concurrency.max(1),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether a batch is currently running for the job. Progress endpoints
    /// report this as `settled = !in_flight`.
    pub async fn is_in_flight(&self, job_id: i64) -> bool {
        self.in_flight
            .lock()
            .await
            .get(&job_id)
            .map(|settled| !*settled.borrow())
            .unwrap_or(false)
    }

    /// Start a batch for the job and return without waiting for it. While a
    /// batch is in flight for the same job, a second trigger is refused with
    /// `BatchInFlight` so callers can tell the guard from a failure.
    #[instrument(skip(self))]
    pub async fn trigger(
        &self,
        job_id: i64,
        organization_id: i64,
        rescore: bool,
    ) -> Result<BatchHandle, ScoringError> {
        // The lock is held across target-set computation so two concurrent
        // triggers for one job cannot both pass the guard.
        let mut in_flight = self.in_flight.lock().await;

        if let Some(settled) = in_flight.get(&job_id) {
            if !*settled.borrow() {
                return Err(ScoringError::BatchInFlight(job_id));
            }
        }

        let targets = self
            .scorer
            .target_application_ids(job_id, organization_id, rescore)
            .await?;

        let (settled_tx, settled_rx) = watch::channel(false);
        in_flight.insert(job_id, settled_rx.clone());
        drop(in_flight);

        let batch_run_id = run_id::generate();
        let targeted = targets.len();

        info!(
            %batch_run_id,
            job_id,
            organization_id,
            rescore,
            targeted,
            "triggering scoring batch"
        );

        let scorer = Arc::clone(&self.scorer);
        let in_flight = Arc::clone(&self.in_flight);
        let concurrency = self.concurrency;
        let run_id = batch_run_id.clone();
        tokio::spawn(async move {
            run_batch(
                scorer,
                in_flight,
                concurrency,
                job_id,
                organization_id,
                targets,
                run_id,
                settled_tx,
            )
            .await;
        });

        Ok(BatchHandle {
            batch_run_id,
            targeted,
            settled: settled_rx,
        })
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_batch(
    scorer: Arc<dyn BatchScorer>,
    in_flight: InFlightMap,
    concurrency: usize,
    job_id: i64,
    organization_id: i64,
    targets: Vec<i64>,
    batch_run_id: String,
    settled_tx: watch::Sender<bool>,
) {
    let limiter = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();

    for application_id in targets {
        let limiter = Arc::clone(&limiter);
        let scorer = Arc::clone(&scorer);

        tasks.spawn(async move {
            let _permit = match limiter.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return (
                        application_id,
                        Err(ScoringError::Configuration(
                            "scoring concurrency limiter closed".into(),
                        )),
                    )
                }
            };

            let result = scorer.score_application(application_id, organization_id).await;
            (application_id, result)
        });
    }

    let mut scored = 0usize;
    let mut failed = 0usize;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(_))) => {
                scored += 1;
                metrics::counter!("cm_applications_scored_total").increment(1);
            }
            Ok((application_id, Err(err))) => {
                failed += 1;
                metrics::counter!("cm_applications_failed_total").increment(1);
                warn!(
                    %batch_run_id,
                    application_id,
                    error = %err,
                    "application scoring failed; batch continues"
                );
            }
            Err(join_err) => {
                failed += 1;
                metrics::counter!("cm_applications_failed_total").increment(1);
                error!(%batch_run_id, error = %join_err, "scoring task panicked");
            }
        }
    }

    metrics::counter!("cm_batch_runs_total").increment(1);
    info!(%batch_run_id, job_id, scored, failed, "batch settled");

    let _ = settled_tx.send(true);
    in_flight.lock().await.remove(&job_id);
}
