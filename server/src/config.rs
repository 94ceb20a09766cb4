//! Server Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{Context, Result};
use chrono::Duration;
use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub bind_address: String,

    /// Allowed CORS origins; `*` enables the permissive development mode
    pub cors_allowed_origins: Vec<String>,

    /// JWT signing secret used to verify connection tokens
    pub jwt_secret: String,

    /// Base URL of the REST/store layer (optional; persistence disabled if unset)
    pub store_base_url: Option<String>,

    /// Per-connection egress queue depth (default: 100)
    pub send_queue_depth: usize,

    /// Maximum inbound frame size in bytes (default: 64 KiB)
    pub max_frame_bytes: usize,

    /// Pending join request time-to-live in seconds (default: 300 = 5 min)
    pub pending_ttl_secs: i64,

    /// Join request deduplication window in seconds (default: 5)
    pub dedup_window_secs: i64,

    /// Expiry sweep interval in seconds (default: 60)
    pub sweep_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            store_base_url: env::var("STORE_BASE_URL").ok(),
            send_queue_depth: env::var("SEND_QUEUE_DEPTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            max_frame_bytes: env::var("MAX_FRAME_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(64 * 1024), // 64 KiB
            pending_ttl_secs: env::var("PENDING_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300), // 5 minutes
            dedup_window_secs: env::var("DEDUP_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        })
    }

    /// Time-to-live for pending join requests.
    #[must_use]
    pub fn pending_ttl(&self) -> Duration {
        Duration::seconds(self.pending_ttl_secs)
    }

    /// Window within which a repeated join request is treated as a duplicate.
    #[must_use]
    pub fn dedup_window(&self) -> Duration {
        Duration::seconds(self.dedup_window_secs)
    }

    /// Create a default configuration for testing.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".into(),
            cors_allowed_origins: vec!["*".into()],
            jwt_secret: "test-secret".into(),
            store_base_url: None,
            send_queue_depth: 100,
            max_frame_bytes: 64 * 1024,
            pending_ttl_secs: 300,
            dedup_window_secs: 5,
            sweep_interval_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_have_expected_defaults() {
        let config = Config::default_for_test();
        assert_eq!(config.send_queue_depth, 100);
        assert_eq!(config.max_frame_bytes, 65536);
        assert_eq!(config.pending_ttl(), Duration::minutes(5));
        assert_eq!(config.dedup_window(), Duration::seconds(5));
        assert_eq!(config.sweep_interval_secs, 60);
    }
}
