use crate::api::{stats, views, AppState};
use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api_cors = build_api_cors(state.api_origin.as_deref());

    let api_routes = Router::new()
        .route("/documents/{id}/views", get(views::get_document_views))
        .route("/documents/{id}/stats", get(stats::get_document_stats))
        .route(
            "/documents/{id}/views/{view_id}/stats",
            get(stats::get_view_stats),
        )
        .route(
            "/documents/{id}/views/{view_id}/video-stats",
            get(stats::get_view_video_stats),
        )
        .route("/links/{id}/visits", get(views::get_link_visits))
        .layer(api_cors);

    Router::new()
        .route("/health", get(health_check))
        .route("/health/detailed", get(detailed_health_check))
        .nest("/api", api_routes)
        .layer(axum::middleware::map_response(add_security_headers))
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(30),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Inject OWASP-recommended security headers on every HTTP response.
async fn add_security_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    response
}

/// Build the CORS layer for the stats API based on the configured origin.
fn build_api_cors(api_origin: Option<&str>) -> CorsLayer {
    api_origin.map_or_else(
        || {
            // No origin configured; allow all. Set `api_origin` in config to
            // restrict cross-origin access.
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        },
        |origin| {
            let allowed_origin = origin
                .parse::<axum::http::HeaderValue>()
                .unwrap_or_else(|_| axum::http::HeaderValue::from_static("*"));
            CorsLayer::new()
                .allow_origin(allowed_origin)
                .allow_methods([Method::GET])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                .allow_credentials(true)
        },
    )
}

/// GET /health, a simple health check endpoint.
async fn health_check() -> &'static str {
    "ok"
}

/// GET /health/detailed with configuration info.
async fn detailed_health_check(
    State(state): State<Arc<AppState>>,
) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "analytics_configured": state.analytics.is_configured(),
        "free_plan_view_limit": state.free_plan_view_limit,
    }))
}
