//!
//! GraphSync Core - bidirectional sync between a scene graph and a replicated
//! document
//!
//! Local scene mutations become origin-tagged document transactions; document
//! changes from peers become scene mutations. A shared reentrancy guard keeps
//! the two directions from echoing into each other.

#![forbid(unsafe_code)]

/// Domain layer - replicated records, seams and edge styling
pub mod domain;

/// Application services - the sync engine
pub mod application;

/// Core value types
pub mod types;

/// Error types
pub mod error;

/// Engine configuration
pub mod config;

pub use application::{
    GraphSyncManager, LayoutModeCallback, LoadSummary, OriginGuard, RemoteApplyScope,
};
pub use config::SyncConfig;
pub use domain::document::{
    ChangeAction, DocumentObserver, KeyChange, MapChangeEvent, MapName, ObserverId, Origin,
    Provenance, SharedDocument, Transaction, LOCAL_ORIGIN,
};
pub use domain::records::{
    EdgeKind, EdgeMetadata, EdgeRecord, NodeAttributes, NodeProps, NodeRecord, RelationalSubtype,
    SemanticType, StructuralType,
};
pub use domain::scene::{
    Cell, EdgeData, ListenerId, LocalUiState, NodeData, SceneEdge, SceneEvent, SceneGraph,
    SceneGraphError, SceneListener, SceneNode,
};
pub use error::{SyncError, SyncResult};
pub use types::{LayoutMode, Position, Size};
