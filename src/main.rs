use std::sync::Arc;
use std::time::Duration;
use viewprint::analytics::{AnalyticsClient, HttpEventSource};
use viewprint::api::AppState;
use viewprint::config::Config;
use viewprint::server;
use viewprint::storage::memory::MemoryStore;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "viewprint=info,tower_http=info".into()),
        )
        .init();

    // Load configuration
    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref().map(std::path::Path::new));

    tracing::info!(
        host = %config.host,
        port = config.port,
        analytics_base_url = %config.analytics_base_url,
        "Starting Viewprint"
    );

    let token_configured = config.analytics_token.is_some();
    if !token_configured {
        tracing::warn!(
            "No analytics token configured; all responses will report analyticsEnabled=false. \
             Set VIEWPRINT_ANALYTICS_TOKEN to enable engagement metrics."
        );
    }

    let source = HttpEventSource::new(
        &config.analytics_base_url,
        config.analytics_token.as_deref().unwrap_or_default(),
        Duration::from_secs(config.analytics_timeout_secs),
    )
    .expect("Failed to build analytics client");
    let analytics = AnalyticsClient::new(Arc::new(source), token_configured);

    // Record storage is a collaborator; the bundled in-memory store backs
    // standalone and demo deployments.
    let store = Arc::new(MemoryStore::new());

    let state = Arc::new(AppState {
        store,
        analytics,
        free_plan_view_limit: config.free_plan_view_limit,
        api_origin: config.api_origin.clone(),
    });

    let app = server::build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!(addr = %addr, "Listening");
    axum::serve(listener, app).await.expect("Server error");
}
