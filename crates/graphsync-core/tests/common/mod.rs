#![allow(dead_code)]

use graphsync_core::{
    GraphSyncManager, LayoutMode, LayoutModeCallback, MapName, NodeRecord, Origin, SharedDocument,
    SyncConfig,
};
use graphsync_doc_inmemory::InMemoryDocument;
use graphsync_test_utils::{init_test_logging, InMemorySceneGraph};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// One engine wired to an in-memory scene graph and document
pub struct Session {
    pub scene: Arc<InMemorySceneGraph>,
    pub doc: Arc<InMemoryDocument>,
    pub manager: GraphSyncManager,
    pub modes: Arc<Mutex<Vec<LayoutMode>>>,
}

pub fn session() -> Session {
    session_with(SyncConfig::default(), Arc::new(InMemoryDocument::with_client_id(1)))
}

pub fn session_with(config: SyncConfig, doc: Arc<InMemoryDocument>) -> Session {
    init_test_logging();
    let scene = InMemorySceneGraph::new();
    let modes = Arc::new(Mutex::new(Vec::new()));
    let sink = modes.clone();
    let callback: LayoutModeCallback = Arc::new(move |mode: LayoutMode| sink.lock().push(mode));

    let manager = GraphSyncManager::new(config);
    manager
        .initialize(scene.clone(), doc.clone(), Some(callback))
        .unwrap();

    Session {
        scene,
        doc,
        manager,
        modes,
    }
}

/// Write one key in its own transaction
pub fn write(doc: &dyn SharedDocument, origin: Option<Origin>, map: MapName, key: &str, value: Value) {
    doc.transact(origin, &mut |txn| {
        txn.set(map, key, value.clone());
        Ok(())
    })
    .unwrap();
}

pub fn remove(doc: &dyn SharedDocument, origin: Option<Origin>, map: MapName, key: &str) {
    doc.transact(origin, &mut |txn| {
        txn.delete(map, key);
        Ok(())
    })
    .unwrap();
}

pub fn stored_node(doc: &dyn SharedDocument, id: &str) -> Option<NodeRecord> {
    doc.get(MapName::Nodes, id)
        .map(|value| NodeRecord::from_value(id, &value).unwrap())
}
