//! Configuration for the sync engine
//!
//! Defaults match the collaborative mind-map canvas; hosts override them from
//! a config file (serde) or from `GRAPHSYNC_*` environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};
use crate::types::Size;

/// Sync engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Width given to nodes created from remote records
    #[serde(default = "default_node_width")]
    pub default_node_width: f64,

    /// Height given to nodes created from remote records
    #[serde(default = "default_node_height")]
    pub default_node_height: f64,

    /// Shape name given to nodes created from remote records
    #[serde(default = "default_node_shape")]
    pub node_shape: String,

    /// Queue edge-data commits until `flush_deferred` instead of committing
    /// inside the change event
    #[serde(default)]
    pub defer_edge_data_commits: bool,

    /// Commit position snapshots on every position change, not only at the
    /// end of a drag
    #[serde(default = "default_sync_on_continuous_move")]
    pub sync_on_continuous_move: bool,
}

fn default_node_width() -> f64 {
    120.0
}

fn default_node_height() -> f64 {
    50.0
}

fn default_node_shape() -> String {
    "mind-node".to_string()
}

fn default_sync_on_continuous_move() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_node_width: default_node_width(),
            default_node_height: default_node_height(),
            node_shape: default_node_shape(),
            defer_edge_data_commits: false,
            sync_on_continuous_move: default_sync_on_continuous_move(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> SyncResult<Self> {
        let mut config = Self::default();
        config.apply_overrides(|name| env::var(name).ok());
        config.validate()?;
        info!("Loaded sync configuration");
        Ok(config)
    }

    /// Apply `GRAPHSYNC_*` overrides read through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(width) = lookup("GRAPHSYNC_NODE_WIDTH") {
            match width.parse::<f64>() {
                Ok(width) => self.default_node_width = width,
                Err(_) => warn!("Invalid GRAPHSYNC_NODE_WIDTH value: {}", width),
            }
        }

        if let Some(height) = lookup("GRAPHSYNC_NODE_HEIGHT") {
            match height.parse::<f64>() {
                Ok(height) => self.default_node_height = height,
                Err(_) => warn!("Invalid GRAPHSYNC_NODE_HEIGHT value: {}", height),
            }
        }

        if let Some(shape) = lookup("GRAPHSYNC_NODE_SHAPE") {
            self.node_shape = shape;
        }

        if let Some(defer) = lookup("GRAPHSYNC_DEFER_EDGE_DATA") {
            match parse_flag(&defer) {
                Some(flag) => self.defer_edge_data_commits = flag,
                None => warn!("Invalid GRAPHSYNC_DEFER_EDGE_DATA value: {}", defer),
            }
        }

        if let Some(continuous) = lookup("GRAPHSYNC_SYNC_CONTINUOUS_MOVE") {
            match parse_flag(&continuous) {
                Some(flag) => self.sync_on_continuous_move = flag,
                None => warn!("Invalid GRAPHSYNC_SYNC_CONTINUOUS_MOVE value: {}", continuous),
            }
        }
    }

    pub fn validate(&self) -> SyncResult<()> {
        if !(self.default_node_width > 0.0) || !(self.default_node_height > 0.0) {
            return Err(SyncError::Configuration(format!(
                "Node size must be positive, got {}x{}",
                self.default_node_width, self.default_node_height
            )));
        }

        if self.node_shape.trim().is_empty() {
            return Err(SyncError::Configuration(
                "Node shape must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Size given to nodes created from remote records
    pub fn default_node_size(&self) -> Size {
        Size::new(self.default_node_width, self.default_node_height)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.default_node_size(), Size::new(120.0, 50.0));
        assert_eq!(config.node_shape, "mind-node");
        assert!(!config.defer_edge_data_commits);
        assert!(config.sync_on_continuous_move);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_apply_and_invalid_values_are_ignored() {
        let mut config = SyncConfig::default();
        config.apply_overrides(lookup(&[
            ("GRAPHSYNC_NODE_WIDTH", "200"),
            ("GRAPHSYNC_NODE_HEIGHT", "tall"),
            ("GRAPHSYNC_DEFER_EDGE_DATA", "true"),
            ("GRAPHSYNC_SYNC_CONTINUOUS_MOVE", "maybe"),
        ]));

        assert_eq!(config.default_node_width, 200.0);
        assert_eq!(config.default_node_height, 50.0);
        assert!(config.defer_edge_data_commits);
        assert!(config.sync_on_continuous_move);
    }

    #[test]
    fn test_validate_rejects_non_positive_sizes() {
        let config = SyncConfig {
            default_node_width: 0.0,
            ..SyncConfig::default()
        };
        assert!(matches!(config.validate(), Err(SyncError::Configuration(_))));

        let config = SyncConfig {
            default_node_height: f64::NAN,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserializes_partial_config() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"defer_edge_data_commits": true}"#).unwrap();
        assert!(config.defer_edge_data_commits);
        assert_eq!(config.node_shape, "mind-node");
    }
}
