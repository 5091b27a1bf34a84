use crate::api::errors::ApiError;
use crate::api::AppState;
use crate::query::pipeline::{self, DocumentStats, VideoStats, ViewStats};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

/// Query parameters for the document stats endpoint.
#[derive(Debug, Deserialize)]
pub struct StatsParams {
    #[serde(default, rename = "excludeTeamMembers")]
    pub exclude_team_members: bool,
}

/// GET /api/documents/{id}/stats with document-wide aggregates.
pub async fn get_document_stats(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
    Query(params): Query<StatsParams>,
) -> Result<Json<DocumentStats>, ApiError> {
    let stats = pipeline::document_stats(
        state.store.as_ref(),
        &state.analytics,
        &document_id,
        params.exclude_team_members,
    )
    .await?;
    Ok(Json(stats))
}

/// GET /api/documents/{id}/views/{view_id}/stats with per-page durations of
/// one view.
pub async fn get_view_stats(
    State(state): State<Arc<AppState>>,
    Path((document_id, view_id)): Path<(String, String)>,
) -> Result<Json<ViewStats>, ApiError> {
    let document = state
        .store
        .document(&document_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;
    let stats = pipeline::view_stats(&state.analytics, &document.id, &view_id).await?;
    Ok(Json(stats))
}

/// GET /api/documents/{id}/views/{view_id}/video-stats with the per-second
/// playback curve of one view.
pub async fn get_view_video_stats(
    State(state): State<Arc<AppState>>,
    Path((document_id, view_id)): Path<(String, String)>,
) -> Result<Json<VideoStats>, ApiError> {
    let document = state
        .store
        .document(&document_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;
    if document.video_length_secs() <= 0.0 {
        return Err(ApiError::BadRequest("Video length not found".to_string()));
    }
    let stats = pipeline::video_stats(&state.analytics, &document, &view_id).await?;
    Ok(Json(stats))
}
