//! Presence and awareness configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::warn;

use crate::user::DEFAULT_PALETTE;

/// Presence manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Minimum interval between two cursor-only peer deliveries
    #[serde(default = "default_cursor_throttle_ms")]
    pub cursor_throttle_ms: u64,

    /// Colors assigned to users without an explicit color
    #[serde(default = "default_palette")]
    pub palette: Vec<String>,
}

fn default_cursor_throttle_ms() -> u64 {
    50
}

fn default_palette() -> Vec<String> {
    DEFAULT_PALETTE.iter().map(|color| color.to_string()).collect()
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            cursor_throttle_ms: default_cursor_throttle_ms(),
            palette: default_palette(),
        }
    }
}

impl PresenceConfig {
    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(throttle) = env::var("GRAPHSYNC_CURSOR_THROTTLE_MS") {
            match throttle.parse::<u64>() {
                Ok(ms) => config.cursor_throttle_ms = ms,
                Err(_) => warn!("Invalid GRAPHSYNC_CURSOR_THROTTLE_MS value: {}", throttle),
            }
        }
        config
    }

    pub fn cursor_throttle(&self) -> Duration {
        Duration::from_millis(self.cursor_throttle_ms)
    }
}

/// In-memory awareness hub configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwarenessConfig {
    /// Sessions silent for longer than this are dropped by `prune_stale`
    #[serde(default = "default_liveness_timeout_ms")]
    pub liveness_timeout_ms: u64,
}

fn default_liveness_timeout_ms() -> u64 {
    30_000
}

impl Default for AwarenessConfig {
    fn default() -> Self {
        Self {
            liveness_timeout_ms: default_liveness_timeout_ms(),
        }
    }
}

impl AwarenessConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(timeout) = env::var("GRAPHSYNC_AWARENESS_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(ms) => config.liveness_timeout_ms = ms,
                Err(_) => warn!("Invalid GRAPHSYNC_AWARENESS_TIMEOUT_MS value: {}", timeout),
            }
        }
        config
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }
}
