//! The replicated document seam.
//!
//! A [`SharedDocument`] holds three last-writer-wins maps of JSON values.
//! Writes happen inside origin-tagged transactions; observers receive one
//! [`MapChangeEvent`] per map touched by a transaction or a merged update.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::error::SyncResult;

/// The replicated maps of a graph document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapName {
    Nodes,
    Edges,
    Meta,
}

impl MapName {
    pub const ALL: [MapName; 3] = [MapName::Nodes, MapName::Edges, MapName::Meta];

    pub fn as_str(&self) -> &'static str {
        match self {
            MapName::Nodes => "nodes",
            MapName::Edges => "edges",
            MapName::Meta => "meta",
        }
    }
}

impl fmt::Display for MapName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag attached to a transaction identifying its source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin(Cow<'static, str>);

impl Origin {
    pub fn new(tag: impl Into<Cow<'static, str>>) -> Self {
        Origin(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Origin of every transaction committed by the local change translator
pub const LOCAL_ORIGIN: Origin = Origin(Cow::Borrowed("graph-sync-local"));

/// Whether a change was produced by a transaction on this replica or merged
/// from a peer's update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Add,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChange {
    pub key: String,
    pub action: ChangeAction,
}

impl KeyChange {
    pub fn new(key: impl Into<String>, action: ChangeAction) -> Self {
        Self {
            key: key.into(),
            action,
        }
    }
}

/// Changes to one map, in the order the keys were first touched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapChangeEvent {
    pub map: MapName,
    pub origin: Option<Origin>,
    pub provenance: Provenance,
    pub changes: Vec<KeyChange>,
}

impl MapChangeEvent {
    /// Whether the transaction was committed by this process's translator
    pub fn is_local_origin(&self) -> bool {
        self.origin.as_ref() == Some(&LOCAL_ORIGIN)
    }
}

pub type DocumentObserver = Arc<dyn Fn(&MapChangeEvent) + Send + Sync>;

/// Handle returned by [`SharedDocument::observe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u64);

/// Read/write access to the maps inside a transaction
pub trait Transaction {
    /// Current value, including writes staged earlier in this transaction
    fn get(&self, map: MapName, key: &str) -> Option<Value>;

    fn set(&mut self, map: MapName, key: &str, value: Value);

    /// Returns whether the key held a value
    fn delete(&mut self, map: MapName, key: &str) -> bool;
}

/// A replicated document of three maps
pub trait SharedDocument: Send + Sync {
    fn get(&self, map: MapName, key: &str) -> Option<Value>;

    fn keys(&self, map: MapName) -> Vec<String>;

    fn entries(&self, map: MapName) -> Vec<(String, Value)>;

    /// Run `f` as one atomic transaction tagged with `origin`.
    ///
    /// When `f` returns an error nothing is committed and no observer runs.
    /// Observers are notified after the transaction commits.
    fn transact(
        &self,
        origin: Option<Origin>,
        f: &mut dyn FnMut(&mut dyn Transaction) -> SyncResult<()>,
    ) -> SyncResult<()>;

    fn observe(&self, map: MapName, observer: DocumentObserver) -> ObserverId;

    fn unobserve(&self, id: ObserverId);
}
