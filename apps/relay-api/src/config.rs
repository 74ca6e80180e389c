use std::time::Duration;

/// Relay API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Upstream app page scanned for build markers.
    pub upstream_url: String,
    /// Path of the JSON blob holding the deduplicated build history.
    pub builds_path: String,
    /// Period of the shared build-check timer.
    pub poll_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables. Every variable has a
    /// default, so the server can start with an empty environment.
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4010),
            upstream_url: std::env::var("UPSTREAM_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://canary.discord.com/app".to_string()),
            builds_path: std::env::var("BUILDS_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "hashes.json".to_string()),
            poll_interval: Duration::from_secs(
                std::env::var("POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }
}
