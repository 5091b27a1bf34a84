use serde::Deserialize;
use std::path::Path;

/// Application configuration loaded from environment variables or TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL of the time-series analytics backend.
    #[serde(default = "default_analytics_base_url")]
    pub analytics_base_url: String,
    /// Token for the analytics backend. If not set, every stats response
    /// degrades to analyticsEnabled=false instead of erroring.
    #[serde(default)]
    pub analytics_token: Option<String>,
    /// Request timeout against the analytics backend, in seconds.
    #[serde(default = "default_analytics_timeout_secs")]
    pub analytics_timeout_secs: u64,
    /// How many views per document get detailed aggregation on a free plan.
    #[serde(default = "default_free_plan_view_limit")]
    pub free_plan_view_limit: usize,
    /// Allowed origin for CORS on the stats API. If not set, any origin.
    #[serde(default)]
    pub api_origin: Option<String>,
    /// Graceful shutdown timeout in seconds (default: 30).
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8000
}

fn default_analytics_base_url() -> String {
    "https://api.tinybird.co".to_string()
}

const fn default_analytics_timeout_secs() -> u64 {
    10
}

const fn default_free_plan_view_limit() -> usize {
    20
}

const fn default_shutdown_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            analytics_base_url: default_analytics_base_url(),
            analytics_token: None,
            analytics_timeout_secs: default_analytics_timeout_secs(),
            free_plan_view_limit: default_free_plan_view_limit(),
            api_origin: None,
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// Environment variables override file values:
    /// - `VIEWPRINT_HOST` → host
    /// - `VIEWPRINT_PORT` → port
    /// - `VIEWPRINT_ANALYTICS_URL` → analytics_base_url
    /// - `VIEWPRINT_ANALYTICS_TOKEN` → analytics_token
    /// - `VIEWPRINT_ANALYTICS_TIMEOUT` → analytics_timeout_secs
    /// - `VIEWPRINT_FREE_VIEW_LIMIT` → free_plan_view_limit
    /// - `VIEWPRINT_API_ORIGIN` → api_origin
    /// - `VIEWPRINT_SHUTDOWN_TIMEOUT` → shutdown_timeout_secs
    pub fn load(config_path: Option<&Path>) -> Self {
        let mut config =
            config_path.map_or_else(Self::default, |path| match std::fs::read_to_string(path) {
                Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                    tracing::warn!("Failed to parse config file: {e}, using defaults");
                    Self::default()
                }),
                Err(e) => {
                    tracing::warn!("Failed to read config file: {e}, using defaults");
                    Self::default()
                }
            });

        // Environment variable overrides
        if let Ok(host) = std::env::var("VIEWPRINT_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("VIEWPRINT_PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }
        if let Ok(url) = std::env::var("VIEWPRINT_ANALYTICS_URL") {
            config.analytics_base_url = url;
        }
        if let Ok(token) = std::env::var("VIEWPRINT_ANALYTICS_TOKEN") {
            if !token.is_empty() {
                config.analytics_token = Some(token);
            }
        }
        if let Ok(timeout) = std::env::var("VIEWPRINT_ANALYTICS_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                config.analytics_timeout_secs = t;
            }
        }
        if let Ok(limit) = std::env::var("VIEWPRINT_FREE_VIEW_LIMIT") {
            if let Ok(l) = limit.parse() {
                config.free_plan_view_limit = l;
            }
        }
        if let Ok(origin) = std::env::var("VIEWPRINT_API_ORIGIN") {
            config.api_origin = Some(origin);
        }
        if let Ok(timeout) = std::env::var("VIEWPRINT_SHUTDOWN_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                config.shutdown_timeout_secs = t;
            }
        }

        config
    }
}
