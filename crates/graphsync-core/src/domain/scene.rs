//! The scene graph seam: the rendered graph the engine keeps in sync.
//!
//! The engine never owns the scene graph. Hosts implement [`SceneGraph`] over
//! their canvas, emitting a [`SceneEvent`] after each mutation has been applied.

use std::sync::Arc;
use thiserror::Error;

use super::edge_style::EdgeStyle;
use super::records::{EdgeKind, EdgeMetadata, EdgeRecord, NodeAttributes, NodeRecord};
use crate::types::{Position, Size};

/// Errors returned by scene graph mutators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneGraphError {
    #[error("Cell not found: {0}")]
    NotFound(String),

    #[error("Cell {id} is not a {expected}")]
    WrongKind { id: String, expected: &'static str },

    #[error("Cell already exists: {0}")]
    Duplicate(String),
}

/// Node-scoped state that lives only in the local scene graph
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalUiState {
    pub is_editing: bool,
    pub is_selected: bool,
    pub is_connection_source: bool,
    pub batch_id: Option<String>,
}

/// Data payload of a scene node: replicated attributes plus local UI state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeData {
    pub attributes: NodeAttributes,
    pub ui: LocalUiState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub id: String,
    pub position: Position,
    pub size: Size,
    pub shape: String,
    pub data: NodeData,
    pub visible: bool,
}

impl SceneNode {
    /// Full replicated snapshot of this node
    pub fn to_record(&self) -> NodeRecord {
        NodeRecord::new(self.id.clone(), self.position, self.data.attributes.clone())
    }

    pub fn is_archived(&self) -> bool {
        self.data.attributes.is_archived
    }
}

/// Data payload of a scene edge
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdgeData {
    pub legacy_type: Option<String>,
    pub metadata: Option<EdgeMetadata>,
}

impl EdgeData {
    pub fn from_record(record: &EdgeRecord) -> Self {
        Self {
            legacy_type: record.legacy_type.clone(),
            metadata: record.metadata,
        }
    }

    pub fn normalized_metadata(&self) -> EdgeMetadata {
        super::records::resolve_edge_metadata(self.metadata.as_ref(), self.legacy_type.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub data: EdgeData,
    pub style: EdgeStyle,
    pub visible: bool,
}

impl SceneEdge {
    /// Full replicated snapshot of this edge
    pub fn to_record(&self) -> EdgeRecord {
        EdgeRecord {
            id: self.id.clone(),
            source_id: self.source.clone(),
            target_id: self.target.clone(),
            legacy_type: self.data.legacy_type.clone(),
            metadata: self.data.metadata,
        }
    }

    pub fn kind(&self) -> EdgeKind {
        self.data.normalized_metadata().kind
    }

    pub fn has_endpoints(&self) -> bool {
        !self.source.is_empty() && !self.target.is_empty()
    }
}

/// Any entity in the scene graph
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Node(SceneNode),
    Edge(SceneEdge),
}

impl Cell {
    pub fn id(&self) -> &str {
        match self {
            Cell::Node(node) => &node.id,
            Cell::Edge(edge) => &edge.id,
        }
    }
}

/// Mutation notifications, emitted after the mutation is applied
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    NodeAdded { node: SceneNode },
    NodeRemoved { id: String },
    /// End of a drag
    NodeMoved { node: SceneNode },
    /// Any position change, including each drag frame
    NodePositionChanging { node: SceneNode },
    NodeDataChanged { node: SceneNode },
    EdgeAdded { edge: SceneEdge },
    EdgeRemoved { id: String },
    /// Edge data changed; the current edge is re-read by id
    EdgeDataChanged { edge_id: String },
    /// Removal of a cell whose kind the emitter did not report
    CellRemoved { id: String },
}

pub type SceneListener = Arc<dyn Fn(&SceneEvent) + Send + Sync>;

/// Handle returned by [`SceneGraph::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Graph model backing the canvas
pub trait SceneGraph: Send + Sync {
    fn add_node(&self, node: SceneNode) -> Result<(), SceneGraphError>;

    fn add_edge(&self, edge: SceneEdge) -> Result<(), SceneGraphError>;

    /// Remove a node (and its connected edges) or an edge. Returns whether
    /// anything was removed.
    fn remove_cell(&self, id: &str) -> bool;

    fn get_cell_by_id(&self, id: &str) -> Option<Cell>;

    fn nodes(&self) -> Vec<SceneNode>;

    fn edges(&self) -> Vec<SceneEdge>;

    fn set_position(&self, id: &str, position: Position) -> Result<(), SceneGraphError>;

    fn set_node_data(&self, id: &str, data: NodeData) -> Result<(), SceneGraphError>;

    fn set_edge_data(&self, id: &str, data: EdgeData) -> Result<(), SceneGraphError>;

    fn set_edge_style(&self, id: &str, style: EdgeStyle) -> Result<(), SceneGraphError>;

    fn set_edge_terminals(
        &self,
        id: &str,
        source: &str,
        target: &str,
    ) -> Result<(), SceneGraphError>;

    fn show(&self, id: &str) -> Result<(), SceneGraphError>;

    fn hide(&self, id: &str) -> Result<(), SceneGraphError>;

    fn is_visible(&self, id: &str) -> bool;

    /// Edges with `node_id` as source or target
    fn connected_edges(&self, node_id: &str) -> Vec<SceneEdge>;

    fn subscribe(&self, listener: SceneListener) -> ListenerId;

    fn unsubscribe(&self, id: ListenerId);

    fn get_node(&self, id: &str) -> Option<SceneNode> {
        match self.get_cell_by_id(id) {
            Some(Cell::Node(node)) => Some(node),
            _ => None,
        }
    }

    fn get_edge(&self, id: &str) -> Option<SceneEdge> {
        match self.get_cell_by_id(id) {
            Some(Cell::Edge(edge)) => Some(edge),
            _ => None,
        }
    }
}

/// Non-archived nodes reached from `node_id` over outgoing structural edges
pub fn structural_children(scene: &dyn SceneGraph, node_id: &str) -> Vec<SceneNode> {
    scene
        .connected_edges(node_id)
        .into_iter()
        .filter(|edge| edge.source == node_id && edge.kind() == EdgeKind::Structural)
        .filter_map(|edge| scene.get_node(&edge.target))
        .filter(|node| !node.is_archived())
        .collect()
}

/// The non-archived structural parent of `node_id`, if any
pub fn structural_parent(scene: &dyn SceneGraph, node_id: &str) -> Option<SceneNode> {
    scene
        .connected_edges(node_id)
        .into_iter()
        .filter(|edge| edge.target == node_id && edge.kind() == EdgeKind::Structural)
        .filter_map(|edge| scene.get_node(&edge.source))
        .find(|node| !node.is_archived())
}
