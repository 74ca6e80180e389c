//! Read-only access to the stored build history.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::builds::BuildRecord;
use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/builds", get(list_builds))
        .route("/builds/latest", get(latest_build))
}

/// Full stored history, newest first.
async fn list_builds(State(state): State<AppState>) -> Result<Json<Vec<BuildRecord>>, ApiError> {
    let builds = state.store.get_all().await?;
    Ok(Json(builds))
}

async fn latest_build(State(state): State<AppState>) -> Result<Json<BuildRecord>, ApiError> {
    let latest = state
        .store
        .get_latest()
        .await?
        .ok_or_else(|| ApiError::not_found("No build observed yet"))?;
    Ok(Json(latest))
}
