use std::collections::HashSet;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use cm_common::api::{
    BatchScoreRequest, BatchTriggerResponse, MatchScoreResponse, ScoreProgressResponse,
    ScoreRequest,
};
use cm_common::db::{
    fetch_match_score, fetch_match_scores_for_job, fetch_scored_application_ids,
    fetch_target_application_ids,
};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::SharedState;

#[derive(Debug, Deserialize)]
pub struct OrganizationQuery {
    pub organization_id: i64,
}

/// Score one application synchronously and return the persisted record.
pub async fn score_application(
    State(state): State<SharedState>,
    Path(application_id): Path<i64>,
    _auth: AuthUser,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<MatchScoreResponse>, ApiError> {
    let score = state
        .pipeline
        .score_application(application_id, request.organization_id)
        .await?;

    Ok(Json(score.into()))
}

pub async fn get_application_score(
    State(state): State<SharedState>,
    Path(application_id): Path<i64>,
    _auth: AuthUser,
) -> Result<Json<MatchScoreResponse>, ApiError> {
    let score = fetch_match_score(&state.pool, application_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("no score for application {application_id}"))
        })?;

    Ok(Json(score.into()))
}

pub async fn list_job_scores(
    State(state): State<SharedState>,
    Path(job_id): Path<i64>,
    Query(query): Query<OrganizationQuery>,
    _auth: AuthUser,
) -> Result<Json<Vec<MatchScoreResponse>>, ApiError> {
    let scores = fetch_match_scores_for_job(&state.pool, job_id, query.organization_id).await?;

    Ok(Json(scores.into_iter().map(Into::into).collect()))
}

/// Kick off a batch for the job and return immediately; progress is read
/// from the score table, not from this call.
pub async fn trigger_job_batch(
    State(state): State<SharedState>,
    Path(job_id): Path<i64>,
    _auth: AuthUser,
    Json(request): Json<BatchScoreRequest>,
) -> Result<(StatusCode, Json<BatchTriggerResponse>), ApiError> {
    let handle = state
        .orchestrator
        .trigger(job_id, request.organization_id, request.rescore)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchTriggerResponse {
            batch_run_id: handle.batch_run_id,
            targeted: handle.targeted,
        }),
    ))
}

/// The poller's read operation: scored-vs-total for the job, plus whether a
/// batch is still in flight.
pub async fn job_score_progress(
    State(state): State<SharedState>,
    Path(job_id): Path<i64>,
    Query(query): Query<OrganizationQuery>,
    _auth: AuthUser,
) -> Result<Json<ScoreProgressResponse>, ApiError> {
    let all_applications =
        fetch_target_application_ids(&state.pool, job_id, query.organization_id, true).await?;
    let scored_ids: HashSet<i64> = fetch_scored_application_ids(&state.pool, job_id)
        .await?
        .into_iter()
        .collect();

    let scored = all_applications
        .iter()
        .filter(|id| scored_ids.contains(id))
        .count();
    let settled = !state.orchestrator.is_in_flight(job_id).await;

    Ok(Json(ScoreProgressResponse {
        total: all_applications.len(),
        scored,
        settled,
    }))
}
