//! Edge presentation derived from edge kind and layout mode.
//!
//! Styling is a pure function of the edge's normalized metadata and the
//! current layout mode, so every replica renders the same edge identically.

use serde::{Deserialize, Serialize};

use super::records::{EdgeKind, EdgeMetadata, RelationalSubtype};
use crate::types::LayoutMode;

pub const STRUCTURAL_STROKE: &str = "#64748b";
pub const RELATIONAL_STROKE: &str = "#94a3b8";
pub const RELATIONAL_DASHARRAY: &str = "5 5";
pub const EDGE_STROKE_WIDTH: f64 = 2.0;
pub const ORTHOGONAL_PADDING: f64 = 20.0;
pub const RELATIONAL_CORNER_RADIUS: f64 = 8.0;
pub const TRUNK_CORNER_RADIUS: f64 = 4.0;

/// Routing algorithm of an edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum Router {
    /// Siblings share a vertical trunk below their parent
    SharedTrunkVertical,
    /// Right-angle routing keeping `padding` away from nodes
    Orthogonal { padding: f64 },
}

/// Path shape between route points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum Connector {
    Smooth,
    Rounded { radius: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorSide {
    Top,
    Bottom,
    Left,
    Right,
}

/// Anchor sides at the source and target node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeAnchors {
    pub source: AnchorSide,
    pub target: AnchorSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    Block,
}

/// Stroke attributes of the edge line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineAttrs {
    pub stroke: String,
    pub stroke_width: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_dasharray: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_marker: Option<Marker>,
}

/// Text label placed along the edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeLabel {
    pub text: String,
    /// Relative position along the path, 0.0 to 1.0
    pub position: f64,
}

/// Complete visual style of one edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeStyle {
    pub router: Option<Router>,
    pub connector: Connector,
    pub attrs: LineAttrs,
    pub anchors: Option<EdgeAnchors>,
    pub labels: Vec<EdgeLabel>,
}

impl Default for EdgeStyle {
    fn default() -> Self {
        resolve_edge_style(&EdgeMetadata::structural(), None)
    }
}

/// Compute the style of an edge.
///
/// `mode` is the document's layout mode; `None` (unset) styles like the
/// default mindmap mode.
pub fn resolve_edge_style(metadata: &EdgeMetadata, mode: Option<LayoutMode>) -> EdgeStyle {
    match metadata.kind {
        EdgeKind::Structural => structural_style(mode.unwrap_or_default()),
        EdgeKind::Relational => {
            relational_style(metadata.relational_subtype.unwrap_or_default())
        }
    }
}

fn structural_style(mode: LayoutMode) -> EdgeStyle {
    let attrs = LineAttrs {
        stroke: STRUCTURAL_STROKE.to_string(),
        stroke_width: EDGE_STROKE_WIDTH,
        stroke_dasharray: None,
        target_marker: None,
    };

    match mode {
        LayoutMode::Logic => EdgeStyle {
            router: Some(Router::SharedTrunkVertical),
            connector: Connector::Rounded {
                radius: TRUNK_CORNER_RADIUS,
            },
            attrs,
            anchors: Some(EdgeAnchors {
                source: AnchorSide::Bottom,
                target: AnchorSide::Top,
            }),
            labels: Vec::new(),
        },
        _ => EdgeStyle {
            router: None,
            connector: Connector::Smooth,
            attrs,
            anchors: None,
            labels: Vec::new(),
        },
    }
}

fn relational_style(subtype: RelationalSubtype) -> EdgeStyle {
    EdgeStyle {
        router: Some(Router::Orthogonal {
            padding: ORTHOGONAL_PADDING,
        }),
        connector: Connector::Rounded {
            radius: RELATIONAL_CORNER_RADIUS,
        },
        attrs: LineAttrs {
            stroke: RELATIONAL_STROKE.to_string(),
            stroke_width: EDGE_STROKE_WIDTH,
            stroke_dasharray: Some(RELATIONAL_DASHARRAY.to_string()),
            target_marker: Some(Marker::Block),
        },
        anchors: None,
        labels: vec![EdgeLabel {
            text: subtype.code().to_string(),
            position: 0.5,
        }],
    }
}
