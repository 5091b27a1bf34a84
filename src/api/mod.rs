pub mod errors;
pub mod stats;
pub mod views;

use crate::analytics::AnalyticsClient;
use crate::storage::ViewStore;
use std::sync::Arc;

/// Shared application state for the API handlers.
pub struct AppState {
    pub store: Arc<dyn ViewStore>,
    pub analytics: AnalyticsClient,
    /// Views eligible for detailed aggregation on a free-plan team.
    pub free_plan_view_limit: usize,
    /// Allowed CORS origin for the stats API. None allows any origin.
    pub api_origin: Option<String>,
}
