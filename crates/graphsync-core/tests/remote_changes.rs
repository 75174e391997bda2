//! Document changes from peers flowing into the scene graph.

mod common;

use chrono::{TimeZone, Utc};
use common::{remove, session, session_with, write};
use graphsync_core::domain::edge_style::resolve_edge_style;
use graphsync_core::{
    DocumentObserver, EdgeKind, EdgeMetadata, GraphSyncManager, LayoutMode, ListenerId,
    LoadSummary, MapName, ObserverId, Origin, Position, RelationalSubtype, SceneGraph,
    SceneGraphError, SharedDocument, SyncConfig, SyncResult, Transaction,
};
use graphsync_doc_inmemory::InMemoryDocument;
use graphsync_test_utils::assertions::{assert_node_matches_record, assert_visibility_consistent};
use graphsync_test_utils::{
    EdgeRecordBuilder, InMemorySceneGraph, MockSceneGraph, NodeRecordBuilder, SceneCall,
    SceneNodeBuilder,
};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn quiet_mock() -> MockSceneGraph {
    let mut scene = MockSceneGraph::new();
    scene.expect_subscribe().times(1).returning(|_| ListenerId(0));
    scene.expect_unsubscribe().returning(|_| ());
    scene.expect_get_cell_by_id().returning(|_| None);
    scene.expect_show().returning(|_| Ok(()));
    scene.expect_connected_edges().returning(|_| Vec::new());
    scene
}

#[test]
fn test_merged_peer_node_adds_exactly_one_scene_node() {
    let mut scene = quiet_mock();
    scene
        .expect_add_node()
        .withf(|node| {
            node.id == "n2"
                && node.position == Position::new(30.0, 40.0)
                && node.data.attributes.label == "Remote"
                && node.visible
        })
        .times(1)
        .returning(|_| Ok(()));

    let local = Arc::new(InMemoryDocument::with_client_id(1));
    let manager = GraphSyncManager::new(SyncConfig::default());
    manager
        .initialize(Arc::new(scene), local.clone(), None)
        .unwrap();

    let peer = InMemoryDocument::with_client_id(2);
    write(
        &peer,
        None,
        MapName::Nodes,
        "n2",
        NodeRecordBuilder::new("n2")
            .at(30.0, 40.0)
            .label("Remote")
            .build_value(),
    );
    local
        .apply_update(&peer.encode_state_as_update().unwrap(), None)
        .unwrap();
}

#[test]
fn test_failed_entity_does_not_abort_the_batch() {
    let mut scene = quiet_mock();
    scene
        .expect_add_node()
        .withf(|node| node.id == "a")
        .times(1)
        .returning(|node| Err(SceneGraphError::Duplicate(node.id)));
    scene
        .expect_add_node()
        .withf(|node| node.id == "b")
        .times(1)
        .returning(|_| Ok(()));

    let doc = Arc::new(InMemoryDocument::with_client_id(1));
    let manager = GraphSyncManager::new(SyncConfig::default());
    manager.initialize(Arc::new(scene), doc.clone(), None).unwrap();

    doc.transact(None, &mut |txn| {
        txn.set(MapName::Nodes, "a", NodeRecordBuilder::new("a").build_value());
        txn.set(MapName::Nodes, "b", NodeRecordBuilder::new("b").build_value());
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_remote_update_preserves_local_ui_state() {
    let s = session();
    write(
        &*s.doc,
        None,
        MapName::Nodes,
        "n1",
        NodeRecordBuilder::new("n1").label("Draft").build_value(),
    );
    s.scene
        .update_node_data("n1", |data| data.ui.is_editing = true)
        .unwrap();

    let record = NodeRecordBuilder::new("n1").at(3.0, 4.0).label("Final").build();
    write(&*s.doc, None, MapName::Nodes, "n1", record.to_value().unwrap());

    let node = s.scene.get_node("n1").unwrap();
    assert!(node.data.ui.is_editing);
    assert_node_matches_record(&*s.scene, &record).unwrap();
}

#[test]
fn test_remote_apply_does_not_echo_back() {
    let doc = Arc::new(InMemoryDocument::with_client_id(1));
    let local_transactions = Arc::new(AtomicUsize::new(0));
    let counter = local_transactions.clone();
    doc.on_update(Arc::new(move |_: &[u8]| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    let s = session_with(SyncConfig::default(), doc);

    let peer = InMemoryDocument::with_client_id(2);
    write(&peer, None, MapName::Nodes, "a", NodeRecordBuilder::new("a").build_value());
    write(&peer, None, MapName::Nodes, "b", NodeRecordBuilder::new("b").build_value());
    write(
        &peer,
        None,
        MapName::Edges,
        "e1",
        EdgeRecordBuilder::structural("e1", "a", "b").build_value(),
    );
    s.doc
        .apply_update(&peer.encode_state_as_update().unwrap(), None)
        .unwrap();

    assert!(s.scene.get_edge("e1").is_some());
    assert_eq!(local_transactions.load(Ordering::SeqCst), 0);
}

#[test]
fn test_archive_hides_node_and_incident_edges() {
    let s = session();
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    for id in ["a", "b", "c"] {
        write(&*s.doc, None, MapName::Nodes, id, NodeRecordBuilder::new(id).build_value());
    }
    write(&*s.doc, None, MapName::Edges, "e1", EdgeRecordBuilder::structural("e1", "a", "b").build_value());
    write(&*s.doc, None, MapName::Edges, "e2", EdgeRecordBuilder::structural("e2", "b", "c").build_value());

    write(&*s.doc, None, MapName::Nodes, "b", NodeRecordBuilder::new("b").archived_at(at).build_value());
    assert!(!s.scene.is_visible("b"));
    assert!(!s.scene.is_visible("e1"));
    assert!(!s.scene.is_visible("e2"));
    assert_visibility_consistent(&*s.scene).unwrap();

    write(&*s.doc, None, MapName::Nodes, "c", NodeRecordBuilder::new("c").archived_at(at).build_value());
    write(&*s.doc, None, MapName::Nodes, "b", NodeRecordBuilder::new("b").build_value());

    assert!(s.scene.is_visible("b"));
    assert!(s.scene.is_visible("e1"));
    assert!(!s.scene.is_visible("e2"));
    assert_visibility_consistent(&*s.scene).unwrap();
}

#[test]
fn test_archived_node_arrives_hidden() {
    let s = session();

    write(&*s.doc, None, MapName::Nodes, "gone", NodeRecordBuilder::new("gone").archived().build_value());

    let node = s.scene.get_node("gone").unwrap();
    assert!(!node.visible);
    assert!(node.is_archived());
}

#[test]
fn test_delete_of_absent_node_is_a_no_op() {
    let s = session();
    write(&*s.doc, None, MapName::Nodes, "n9", NodeRecordBuilder::new("n9").build_value());

    // Diverge the scene while detached so the document still holds n9
    s.manager.destroy();
    assert!(s.scene.remove_cell("n9"));
    s.manager
        .initialize(s.scene.clone(), s.doc.clone(), None)
        .unwrap();
    s.scene.clear_calls();

    remove(&*s.doc, None, MapName::Nodes, "n9");
    assert!(s.scene.calls().is_empty());

    s.scene.add_node(SceneNodeBuilder::new("n10").build()).unwrap();
    assert!(s.doc.get(MapName::Nodes, "n10").is_some());
}

#[test]
fn test_remote_node_delete_removes_scene_edges_without_echo() {
    let s = session();
    for id in ["a", "b"] {
        write(&*s.doc, None, MapName::Nodes, id, NodeRecordBuilder::new(id).build_value());
    }
    write(&*s.doc, None, MapName::Edges, "e1", EdgeRecordBuilder::structural("e1", "a", "b").build_value());

    remove(&*s.doc, None, MapName::Nodes, "a");

    assert!(s.scene.get_node("a").is_none());
    assert!(s.scene.get_edge("e1").is_none());
    assert!(s.doc.get(MapName::Edges, "e1").is_some());
}

#[test]
fn test_edges_wait_for_their_endpoints() {
    let s = session();

    write(&*s.doc, None, MapName::Edges, "e1", EdgeRecordBuilder::structural("e1", "a", "b").build_value());
    assert!(s.scene.get_edge("e1").is_none());

    write(&*s.doc, None, MapName::Nodes, "a", NodeRecordBuilder::new("a").build_value());
    assert!(s.scene.get_edge("e1").is_none());

    write(&*s.doc, None, MapName::Nodes, "b", NodeRecordBuilder::new("b").build_value());
    let edge = s.scene.get_edge("e1").unwrap();
    assert_eq!((edge.source.as_str(), edge.target.as_str()), ("a", "b"));
    assert!(edge.visible);
}

#[test]
fn test_remote_edge_update_is_applied_in_place() {
    let s = session();
    for id in ["a", "b", "c"] {
        write(&*s.doc, None, MapName::Nodes, id, NodeRecordBuilder::new(id).build_value());
    }
    write(&*s.doc, None, MapName::Edges, "e1", EdgeRecordBuilder::structural("e1", "a", "b").build_value());
    s.scene.clear_calls();

    write(
        &*s.doc,
        None,
        MapName::Edges,
        "e1",
        EdgeRecordBuilder::relational("e1", "a", "c", RelationalSubtype::StartToFinish).build_value(),
    );

    let edge = s.scene.get_edge("e1").unwrap();
    assert_eq!(edge.target, "c");
    assert_eq!(edge.kind(), EdgeKind::Relational);
    assert_eq!(
        edge.style,
        resolve_edge_style(&EdgeMetadata::relational(RelationalSubtype::StartToFinish), None)
    );
    assert_eq!(
        s.scene.calls(),
        vec![
            SceneCall::SetEdgeTerminals("e1".into()),
            SceneCall::SetEdgeData("e1".into()),
            SceneCall::SetEdgeStyle("e1".into()),
        ]
    );
    assert_eq!(s.scene.count_calls(SceneCall::is_add_node), 0);
}

#[test]
fn test_legacy_edge_shapes_are_normalized() {
    let s = session();
    for id in ["a", "b"] {
        write(&*s.doc, None, MapName::Nodes, id, NodeRecordBuilder::new(id).build_value());
    }

    write(
        &*s.doc,
        None,
        MapName::Edges,
        "old",
        json!({"id": "old", "source": "a", "target": "b", "type": "dependency"}),
    );
    write(
        &*s.doc,
        None,
        MapName::Edges,
        "older",
        json!({"id": "older", "sourceId": "a", "targetId": "b", "metadata": "garbage"}),
    );

    assert_eq!(s.scene.get_edge("old").unwrap().kind(), EdgeKind::Relational);
    assert_eq!(s.scene.get_edge("older").unwrap().kind(), EdgeKind::Structural);
}

#[test]
fn test_malformed_record_is_skipped() {
    let s = session();

    s.doc
        .transact(None, &mut |txn| {
            txn.set(MapName::Nodes, "bad", json!("not a record"));
            txn.set(MapName::Nodes, "good", NodeRecordBuilder::new("good").build_value());
            Ok(())
        })
        .unwrap();

    assert!(s.scene.get_node("bad").is_none());
    assert!(s.scene.get_node("good").is_some());
}

#[test]
fn test_load_initial_state_applies_whole_document() {
    let doc = Arc::new(InMemoryDocument::with_client_id(1));
    write(&*doc, None, MapName::Meta, "layoutMode", json!("logic"));
    for (id, x) in [("r", 0.0), ("a", 100.0), ("b", 200.0)] {
        write(&*doc, None, MapName::Nodes, id, NodeRecordBuilder::new(id).at(x, 50.0).build_value());
    }
    write(&*doc, None, MapName::Edges, "e1", EdgeRecordBuilder::structural("e1", "r", "a").build_value());
    write(&*doc, None, MapName::Edges, "e2", EdgeRecordBuilder::structural("e2", "a", "b").legacy("dependency").build_value());

    let local_transactions = Arc::new(AtomicUsize::new(0));
    let counter = local_transactions.clone();
    doc.on_update(Arc::new(move |_: &[u8]| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    let s = session_with(SyncConfig::default(), doc);

    let summary = s.manager.load_initial_state().unwrap();

    assert_eq!(
        summary,
        LoadSummary {
            nodes: 3,
            edges: 2,
            layout_mode: Some(LayoutMode::Logic),
        }
    );
    assert_eq!(*s.modes.lock(), vec![LayoutMode::Logic]);
    assert_eq!(s.scene.get_node("b").unwrap().position, Position::new(200.0, 50.0));
    assert_eq!(
        s.scene.get_edge("e1").unwrap().style,
        resolve_edge_style(&EdgeMetadata::structural(), Some(LayoutMode::Logic))
    );
    assert_eq!(s.scene.get_edge("e2").unwrap().kind(), EdgeKind::Relational);
    assert_eq!(local_transactions.load(Ordering::SeqCst), 0);
}

#[test]
fn test_any_arrival_order_converges() {
    let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let ops: Vec<(MapName, &str, Value)> = vec![
        (MapName::Nodes, "r", NodeRecordBuilder::new("r").at(0.0, 0.0).label("Root").build_value()),
        (MapName::Nodes, "a", NodeRecordBuilder::new("a").at(120.0, -40.0).parent("r").build_value()),
        (MapName::Nodes, "b", NodeRecordBuilder::new("b").at(120.0, 40.0).parent("r").build_value()),
        (MapName::Nodes, "c", NodeRecordBuilder::new("c").at(240.0, 40.0).archived_at(at).build_value()),
        (MapName::Edges, "e1", EdgeRecordBuilder::structural("e1", "r", "a").build_value()),
        (MapName::Edges, "e2", EdgeRecordBuilder::structural("e2", "r", "b").build_value()),
        (MapName::Edges, "e3", EdgeRecordBuilder::structural("e3", "b", "c").build_value()),
        (MapName::Edges, "e4", EdgeRecordBuilder::relational("e4", "a", "b", RelationalSubtype::FinishToStart).build_value()),
    ];

    let apply = |ops: &[(MapName, &str, Value)]| {
        let s = session();
        for (map, key, value) in ops {
            write(&*s.doc, None, *map, key, value.clone());
        }
        assert_visibility_consistent(&*s.scene).unwrap();
        s.scene.snapshot()
    };

    // e1 moves onto d, which may arrive before or after the edge update
    let repoint: Vec<(MapName, &str, Value)> = vec![
        (MapName::Nodes, "d", NodeRecordBuilder::new("d").at(240.0, -40.0).build_value()),
        (MapName::Edges, "e1", EdgeRecordBuilder::structural("e1", "r", "d").build_value()),
    ];
    let mut repoint_edge_first = repoint.clone();
    repoint_edge_first.reverse();

    let expected = apply(&[ops.clone(), repoint.clone()].concat());
    assert_eq!(expected.nodes.len(), 5);
    assert_eq!(expected.edges.len(), 4);
    let e1 = expected.edges.iter().find(|edge| edge.id == "e1").unwrap();
    assert_eq!((e1.source.as_str(), e1.target.as_str()), ("r", "d"));

    let mut rng = StdRng::seed_from_u64(42);
    for round in 0..24 {
        let mut shuffled = ops.clone();
        shuffled.shuffle(&mut rng);
        let tail = if round % 2 == 0 { &repoint } else { &repoint_edge_first };
        assert_eq!(apply(&[shuffled, tail.clone()].concat()), expected);
    }
}

#[test]
fn test_edge_repointed_at_missing_node_follows_it_on_arrival() {
    let s = session();
    for id in ["a", "b"] {
        write(&*s.doc, None, MapName::Nodes, id, NodeRecordBuilder::new(id).build_value());
    }
    write(&*s.doc, None, MapName::Edges, "e1", EdgeRecordBuilder::structural("e1", "a", "b").build_value());
    assert!(s.scene.get_edge("e1").is_some());

    write(&*s.doc, None, MapName::Edges, "e1", EdgeRecordBuilder::structural("e1", "a", "c").build_value());
    assert!(s.scene.get_edge("e1").is_none());
    assert_eq!(s.doc.get(MapName::Edges, "e1").unwrap()["targetId"], json!("c"));

    write(&*s.doc, None, MapName::Nodes, "c", NodeRecordBuilder::new("c").build_value());
    let edge = s.scene.get_edge("e1").unwrap();
    assert_eq!((edge.source.as_str(), edge.target.as_str()), ("a", "c"));
    assert_visibility_consistent(&*s.scene).unwrap();
}

/// Delegates to an in-memory document, counting full scans of the edge map
struct EdgeScanCountingDocument {
    inner: InMemoryDocument,
    edge_scans: AtomicUsize,
}

impl SharedDocument for EdgeScanCountingDocument {
    fn get(&self, map: MapName, key: &str) -> Option<Value> {
        self.inner.get(map, key)
    }

    fn keys(&self, map: MapName) -> Vec<String> {
        self.inner.keys(map)
    }

    fn entries(&self, map: MapName) -> Vec<(String, Value)> {
        if map == MapName::Edges {
            self.edge_scans.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.entries(map)
    }

    fn transact(
        &self,
        origin: Option<Origin>,
        f: &mut dyn FnMut(&mut dyn Transaction) -> SyncResult<()>,
    ) -> SyncResult<()> {
        self.inner.transact(origin, f)
    }

    fn observe(&self, map: MapName, observer: DocumentObserver) -> ObserverId {
        self.inner.observe(map, observer)
    }

    fn unobserve(&self, id: ObserverId) {
        self.inner.unobserve(id)
    }
}

#[test]
fn test_remote_node_updates_do_not_rescan_edges() {
    let doc = Arc::new(EdgeScanCountingDocument {
        inner: InMemoryDocument::with_client_id(1),
        edge_scans: AtomicUsize::new(0),
    });
    let scene = InMemorySceneGraph::new();
    let manager = GraphSyncManager::new(SyncConfig::default());
    manager.initialize(scene.clone(), doc.clone(), None).unwrap();

    write(&*doc, None, MapName::Nodes, "a", NodeRecordBuilder::new("a").build_value());
    let after_add = doc.edge_scans.load(Ordering::SeqCst);
    assert_eq!(after_add, 1);

    for step in 1..=10 {
        let x = 5.0 * step as f64;
        write(&*doc, None, MapName::Nodes, "a", NodeRecordBuilder::new("a").at(x, 0.0).build_value());
    }

    assert_eq!(scene.get_node("a").unwrap().position, Position::new(50.0, 0.0));
    assert_eq!(doc.edge_scans.load(Ordering::SeqCst), after_add);
}
