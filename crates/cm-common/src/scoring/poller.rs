//! Client-side progress polling over persisted scores.
//!
//! The poller is caller-owned: it borrows a cancellation token and the batch
//! settle signal, re-reads the score table on a fixed interval, and goes
//! back to `Idle` as soon as every target id has a score, the batch settles,
//! or the caller tears it down. It never outlives its caller's interest.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::ScoringError;
use crate::db::{fetch_scored_application_ids, PgPool};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Client-observable lifecycle of one polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Requested,
    Polling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub total: usize,
    pub scored: usize,
}

impl BatchProgress {
    pub fn is_complete(&self) -> bool {
        self.scored >= self.total
    }
}

/// Read side the poller depends on: which of the job's applications already
/// have a persisted score.
#[async_trait]
pub trait ProgressSource: Send + Sync {
    async fn scored_application_ids(&self, job_id: i64) -> Result<Vec<i64>, ScoringError>;
}

#[async_trait]
impl ProgressSource for PgPool {
    async fn scored_application_ids(&self, job_id: i64) -> Result<Vec<i64>, ScoringError> {
        Ok(fetch_scored_application_ids(self, job_id).await?)
    }
}

/// Poll persisted scores for the target set until the batch is done from the
/// caller's point of view. Returns the last observed progress; the final
/// cause (complete, settled, cancelled) is deliberately not distinguished in
/// the return value because the caller stops caring identically in all
/// three cases.
pub async fn poll_until_scored(
    source: &dyn ProgressSource,
    job_id: i64,
    target_ids: &[i64],
    interval: Duration,
    mut settled: watch::Receiver<bool>,
    cancel: &CancellationToken,
) -> Result<BatchProgress, ScoringError> {
    let targets: HashSet<i64> = target_ids.iter().copied().collect();
    let mut progress = BatchProgress {
        total: targets.len(),
        scored: 0,
    };

    let mut state = PollState::Requested;
    debug!(job_id, ?state, "poller started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Cancellation and settle take priority over a tick that is
            // ready at the same instant.
            biased;

            _ = cancel.cancelled() => {
                state = PollState::Idle;
                debug!(job_id, ?state, "poller cancelled by caller");
                return Ok(progress);
            }
            changed = settled.changed() => {
                // Settled (or the batch task dropped its sender): one final
                // read so the caller sees the closing numbers.
                let _ = changed;
                progress = read_progress(source, job_id, &targets).await?;
                state = PollState::Idle;
                debug!(job_id, ?state, scored = progress.scored, "batch settled");
                return Ok(progress);
            }
            _ = ticker.tick() => {
                state = PollState::Polling;
                progress = read_progress(source, job_id, &targets).await?;
                debug!(job_id, ?state, scored = progress.scored, total = progress.total, "poll tick");
                if progress.is_complete() {
                    return Ok(progress);
                }
            }
        }
    }
}

async fn read_progress(
    source: &dyn ProgressSource,
    job_id: i64,
    targets: &HashSet<i64>,
) -> Result<BatchProgress, ScoringError> {
    let scored_ids = source.scored_application_ids(job_id).await?;
    let scored = scored_ids
        .iter()
        .filter(|id| targets.contains(id))
        .count();

    Ok(BatchProgress {
        total: targets.len(),
        scored,
    })
}
