//! Core value types shared by the records, the scene graph and the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SyncError;

/// A point on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Position {
    /// Create a new position
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both coordinates are finite; other values encode as JSON null
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Width and height of a scene node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    /// Width in canvas units
    pub width: f64,
    /// Height in canvas units
    pub height: f64,
}

impl Size {
    /// Create a new size
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// The active arrangement strategy of the shared graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// Radial mind-map tree
    Mindmap,
    /// Strict top-to-bottom tree
    Logic,
    /// Manual positioning
    Free,
    /// Force-directed network
    Network,
}

impl LayoutMode {
    /// Every known layout mode
    pub const ALL: [LayoutMode; 4] = [
        LayoutMode::Mindmap,
        LayoutMode::Logic,
        LayoutMode::Free,
        LayoutMode::Network,
    ];

    /// Wire representation stored in `meta.layoutMode`
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutMode::Mindmap => "mindmap",
            LayoutMode::Logic => "logic",
            LayoutMode::Free => "free",
            LayoutMode::Network => "network",
        }
    }
}

impl Default for LayoutMode {
    fn default() -> Self {
        LayoutMode::Mindmap
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayoutMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| SyncError::Configuration(format!("Unknown layout mode: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_mode_round_trips_through_str() {
        for mode in LayoutMode::ALL {
            assert_eq!(mode.as_str().parse::<LayoutMode>().unwrap(), mode);
        }
        assert!("sideways".parse::<LayoutMode>().is_err());
    }

    #[test]
    fn test_layout_mode_serializes_lowercase() {
        let value = serde_json::to_value(LayoutMode::Logic).unwrap();
        assert_eq!(value, serde_json::json!("logic"));
    }
}
