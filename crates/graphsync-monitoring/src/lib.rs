//! Monitoring module for the GraphSync engine.
//!
//! Installs the `tracing` subscriber used by hosts and tests, and exposes
//! [`SyncMetrics`], the structured metric events emitted by the sync engine
//! and the presence layer.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};

pub mod logging;
pub mod metrics;

pub use crate::logging::init_logging;
pub use crate::metrics::{PresenceMetrics, SyncMetrics, METRICS_TARGET};

/// Configuration for initializing the monitoring system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Service name attached to the startup log line
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Log level filter (e.g., "info,graphsync=debug"); `RUST_LOG` wins when set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Emit JSON lines instead of the pretty development format
    #[serde(default)]
    pub json_logs: bool,
}

fn default_service_name() -> String {
    "graphsync".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_filter: default_log_filter(),
            json_logs: false,
        }
    }
}

impl MonitoringConfig {
    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = env::var("GRAPHSYNC_SERVICE_NAME") {
            config.service_name = name;
        }

        if let Ok(filter) = env::var("GRAPHSYNC_LOG_FILTER") {
            config.log_filter = filter;
        }

        if let Ok(json) = env::var("GRAPHSYNC_LOG_JSON") {
            match json.to_lowercase().as_str() {
                "1" | "true" | "yes" => config.json_logs = true,
                "0" | "false" | "no" => config.json_logs = false,
                _ => warn!("Invalid GRAPHSYNC_LOG_JSON value: {}", json),
            }
        }

        info!(service_name = %config.service_name, "Loaded monitoring configuration");
        config
    }
}
