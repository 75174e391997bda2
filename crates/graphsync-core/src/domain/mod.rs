//! Domain model: replicated records, the scene graph and document seams, and
//! edge styling.

pub mod document;
pub mod edge_style;
pub mod records;
pub mod scene;

pub use document::{
    ChangeAction, DocumentObserver, KeyChange, MapChangeEvent, MapName, ObserverId, Origin,
    Provenance, SharedDocument, Transaction, LOCAL_ORIGIN,
};
pub use edge_style::{resolve_edge_style, EdgeStyle};
pub use records::{EdgeKind, EdgeMetadata, EdgeRecord, NodeAttributes, NodeRecord};
pub use scene::{Cell, SceneEvent, SceneGraph, SceneGraphError, SceneNode, SceneEdge};
