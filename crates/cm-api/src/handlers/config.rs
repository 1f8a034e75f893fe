use axum::{
    extract::{Path, State},
    Json,
};

use cm_common::api::ScoringConfigDto;
use cm_common::db::{fetch_scoring_config, upsert_scoring_config};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::SharedState;

/// Stored config, or the documented defaults when the organization has no
/// row yet.
pub async fn get_scoring_config(
    State(state): State<SharedState>,
    Path(organization_id): Path<i64>,
    _auth: AuthUser,
) -> Result<Json<ScoringConfigDto>, ApiError> {
    let config = fetch_scoring_config(&state.pool, organization_id).await?;
    Ok(Json(config.into()))
}

pub async fn put_scoring_config(
    State(state): State<SharedState>,
    Path(organization_id): Path<i64>,
    _auth: AuthUser,
    Json(request): Json<ScoringConfigDto>,
) -> Result<Json<ScoringConfigDto>, ApiError> {
    let saved = upsert_scoring_config(&state.pool, &request.into_config(organization_id)).await?;
    Ok(Json(saved.into()))
}
