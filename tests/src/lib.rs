//! Multi-peer harness for GraphSync tests.
//!
//! A [`Peer`] is one engine bound to its own scene graph and document
//! replica. [`relay`] forwards a peer's local transactions to another replica
//! the way a network provider would.

use graphsync_core::{GraphSyncManager, LayoutMode, LayoutModeCallback, SyncConfig};
use graphsync_doc_inmemory::{InMemoryDocument, UpdateHookId};
use graphsync_test_utils::{init_test_logging, InMemorySceneGraph};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

pub struct Peer {
    pub name: String,
    pub scene: Arc<InMemorySceneGraph>,
    pub doc: Arc<InMemoryDocument>,
    pub manager: GraphSyncManager,
    /// Layout modes reported by the engine's callback
    pub modes: Arc<Mutex<Vec<LayoutMode>>>,
}

impl Peer {
    pub fn new(name: impl Into<String>, client_id: u64) -> Self {
        Self::with_document(name, Arc::new(InMemoryDocument::with_client_id(client_id)))
    }

    /// A peer whose replica already holds state, e.g. a late joiner. Call
    /// `manager.load_initial_state()` to populate its scene graph.
    pub fn with_document(name: impl Into<String>, doc: Arc<InMemoryDocument>) -> Self {
        init_test_logging();
        let scene = InMemorySceneGraph::new();
        let modes = Arc::new(Mutex::new(Vec::new()));
        let sink = modes.clone();
        let callback: LayoutModeCallback = Arc::new(move |mode: LayoutMode| sink.lock().push(mode));

        let manager = GraphSyncManager::new(SyncConfig::default());
        if let Err(err) = manager.initialize(scene.clone(), doc.clone(), Some(callback)) {
            panic!("peer engine failed to initialize: {err}");
        }

        Self {
            name: name.into(),
            scene,
            doc,
            manager,
            modes,
        }
    }
}

/// Forward every local transaction of `from` into `to`
pub fn relay(from: &Peer, to: &Peer) -> UpdateHookId {
    let target = Arc::downgrade(&to.doc);
    let (from_name, to_name) = (from.name.clone(), to.name.clone());
    from.doc.on_update(Arc::new(move |bytes: &[u8]| {
        if let Some(doc) = target.upgrade() {
            if let Err(err) = doc.apply_update(bytes, None) {
                warn!(from = %from_name, to = %to_name, error = %err, "Relay failed");
            }
        }
    }))
}

/// Relay in both directions between every pair of peers
pub fn connect_all(peers: &[&Peer]) -> Vec<(usize, UpdateHookId)> {
    let mut hooks = Vec::new();
    for (i, from) in peers.iter().enumerate() {
        for (j, to) in peers.iter().enumerate() {
            if i != j {
                hooks.push((i, relay(from, to)));
            }
        }
    }
    hooks
}
