use crate::api::errors::ApiError;
use crate::api::AppState;
use crate::query::pipeline::{self, ListOptions, ViewListResponse};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

/// Largest accepted page size for view listings.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Query parameters for view listing endpoints.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default, rename = "excludeTeamMembers")]
    pub exclude_team_members: bool,
}

const fn default_page() -> u32 {
    1
}

const fn default_limit() -> u32 {
    10
}

impl ListParams {
    /// Validate and convert into pipeline options.
    pub fn validate(&self) -> Result<ListOptions, ApiError> {
        if self.page == 0 {
            return Err(ApiError::BadRequest("page must be at least 1".to_string()));
        }
        if self.limit == 0 || self.limit > MAX_PAGE_SIZE {
            return Err(ApiError::BadRequest(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(ListOptions {
            page: self.page,
            limit: self.limit,
            exclude_team_members: self.exclude_team_members,
        })
    }
}

/// GET /api/documents/{id}/views with per-view engagement metrics.
pub async fn get_document_views(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<ViewListResponse>, ApiError> {
    let options = params.validate()?;
    let response = pipeline::document_view_list(
        state.store.as_ref(),
        &state.analytics,
        &document_id,
        options,
        state.free_plan_view_limit,
    )
    .await?;
    Ok(Json(response))
}

/// GET /api/links/{id}/visits, the same pipeline keyed by link.
pub async fn get_link_visits(
    State(state): State<Arc<AppState>>,
    Path(link_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<ViewListResponse>, ApiError> {
    let options = params.validate()?;
    let response = pipeline::link_view_list(
        state.store.as_ref(),
        &state.analytics,
        &link_id,
        options,
        state.free_plan_view_limit,
    )
    .await?;
    Ok(Json(response))
}
