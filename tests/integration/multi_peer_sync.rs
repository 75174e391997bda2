use graphsync_core::domain::edge_style::resolve_edge_style;
use graphsync_core::{EdgeMetadata, LayoutMode, LoadSummary, Position, RelationalSubtype, SceneGraph};
use graphsync_doc_inmemory::{sync_documents, InMemoryDocument};
use graphsync_test_utils::assertions::assert_visibility_consistent;
use graphsync_test_utils::builders::{relational_edge, structural_edge};
use graphsync_test_utils::SceneNodeBuilder;
use graphsync_tests::{connect_all, Peer};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn seed_tree(peer: &Peer) {
    peer.scene
        .add_node(SceneNodeBuilder::new("root").at(0.0, 0.0).label("Plan").build())
        .unwrap();
    peer.scene
        .add_node(SceneNodeBuilder::new("a").at(150.0, -60.0).label("Design").build())
        .unwrap();
    peer.scene
        .add_node(SceneNodeBuilder::new("b").at(150.0, 60.0).label("Build").build())
        .unwrap();
    peer.scene.add_edge(structural_edge("e1", "root", "a")).unwrap();
    peer.scene.add_edge(structural_edge("e2", "root", "b")).unwrap();
    peer.scene
        .add_edge(relational_edge("d1", "a", "b", RelationalSubtype::FinishToStart))
        .unwrap();
}

#[test]
fn test_edits_propagate_between_connected_peers() {
    let alice = Peer::new("alice", 1);
    let bob = Peer::new("bob", 2);
    connect_all(&[&alice, &bob]);

    seed_tree(&alice);
    bob.scene
        .add_node(SceneNodeBuilder::new("c").at(300.0, 60.0).label("Ship").build())
        .unwrap();
    bob.scene.add_edge(structural_edge("e3", "b", "c")).unwrap();
    alice.scene.move_node("a", Position::new(180.0, -80.0)).unwrap();

    let snapshot = alice.scene.snapshot();
    assert_eq!(snapshot.nodes.len(), 4);
    assert_eq!(snapshot.edges.len(), 4);
    assert_eq!(bob.scene.snapshot(), snapshot);
    assert_eq!(
        bob.scene.get_node("a").unwrap().position,
        Position::new(180.0, -80.0)
    );
}

#[test]
fn test_three_peers_converge() {
    let alice = Peer::new("alice", 1);
    let bob = Peer::new("bob", 2);
    let carol = Peer::new("carol", 3);
    connect_all(&[&alice, &bob, &carol]);

    alice
        .scene
        .add_node(SceneNodeBuilder::new("root").build())
        .unwrap();
    for (peer, id) in [(&alice, "x"), (&bob, "y"), (&carol, "z")] {
        peer.scene.add_node(SceneNodeBuilder::new(id).build()).unwrap();
        peer.scene
            .add_edge(structural_edge(format!("root-{id}"), "root", id))
            .unwrap();
    }

    let expected = alice.scene.snapshot();
    assert_eq!(expected.edges.len(), 3);
    assert_eq!(bob.scene.snapshot(), expected);
    assert_eq!(carol.scene.snapshot(), expected);
}

#[test]
fn test_layout_mode_change_reaches_peer_callback() {
    let alice = Peer::new("alice", 1);
    let bob = Peer::new("bob", 2);
    connect_all(&[&alice, &bob]);
    seed_tree(&alice);

    alice.manager.set_layout_mode(LayoutMode::Logic).unwrap();

    assert!(alice.modes.lock().is_empty());
    assert_eq!(*bob.modes.lock(), vec![LayoutMode::Logic]);
    assert_eq!(bob.manager.get_layout_mode(), Some(LayoutMode::Logic));
    assert_eq!(
        bob.scene.get_edge("e1").unwrap().style,
        resolve_edge_style(&EdgeMetadata::structural(), Some(LayoutMode::Logic))
    );
    assert_eq!(
        bob.scene.get_edge("d1").unwrap().style,
        alice.scene.get_edge("d1").unwrap().style
    );
}

#[test]
fn test_delete_propagates_with_incident_edges() {
    let alice = Peer::new("alice", 1);
    let bob = Peer::new("bob", 2);
    connect_all(&[&alice, &bob]);
    seed_tree(&alice);

    assert!(alice.scene.remove_cell("a"));

    assert!(bob.scene.get_node("a").is_none());
    assert!(bob.scene.get_edge("e1").is_none());
    assert!(bob.scene.get_edge("d1").is_none());
    assert_eq!(bob.scene.snapshot(), alice.scene.snapshot());
}

#[test]
fn test_archive_hides_subtree_edges_on_peer() {
    let alice = Peer::new("alice", 1);
    let bob = Peer::new("bob", 2);
    connect_all(&[&alice, &bob]);
    seed_tree(&alice);

    alice
        .scene
        .update_node_data("a", |data| data.attributes.is_archived = true)
        .unwrap();

    assert!(!bob.scene.is_visible("a"));
    assert!(!bob.scene.is_visible("e1"));
    assert!(!bob.scene.is_visible("d1"));
    assert!(bob.scene.is_visible("e2"));
    assert_visibility_consistent(&*bob.scene).unwrap();

    alice
        .scene
        .update_node_data("a", |data| data.attributes.is_archived = false)
        .unwrap();
    assert!(bob.scene.is_visible("d1"));
    assert_visibility_consistent(&*bob.scene).unwrap();
}

#[test]
fn test_concurrent_offline_edits_converge() -> anyhow::Result<()> {
    let alice = Peer::new("alice", 1);
    let bob = Peer::new("bob", 2);
    seed_tree(&alice);
    sync_documents(&alice.doc, &bob.doc)?;
    assert_eq!(bob.scene.snapshot(), alice.scene.snapshot());

    alice
        .scene
        .update_node_data("root", |data| data.attributes.label = "Alice's plan".into())
        .unwrap();
    bob.scene
        .update_node_data("root", |data| data.attributes.label = "Bob's plan".into())
        .unwrap();
    alice
        .scene
        .add_node(SceneNodeBuilder::new("only-alice").build())
        .unwrap();
    assert!(bob.scene.remove_cell("b"));

    sync_documents(&alice.doc, &bob.doc)?;

    let snapshot = alice.scene.snapshot();
    assert_eq!(bob.scene.snapshot(), snapshot);
    assert_eq!(alice.scene.get_node("root").unwrap().data.attributes.label, "Bob's plan");
    assert!(alice.scene.get_node("b").is_none());
    assert!(bob.scene.get_node("only-alice").is_some());
    Ok(())
}

#[test]
fn test_late_joiner_loads_current_state() -> anyhow::Result<()> {
    let alice = Peer::new("alice", 1);
    seed_tree(&alice);
    alice.manager.set_layout_mode(LayoutMode::Free)?;

    let replica = Arc::new(InMemoryDocument::with_client_id(9));
    replica.apply_update(&alice.doc.encode_state_as_update()?, None)?;
    let carol = Peer::with_document("carol", replica);
    assert!(carol.scene.nodes().is_empty());

    let summary = carol.manager.load_initial_state()?;

    assert_eq!(
        summary,
        LoadSummary {
            nodes: 3,
            edges: 3,
            layout_mode: Some(LayoutMode::Free),
        }
    );
    assert_eq!(*carol.modes.lock(), vec![LayoutMode::Free]);
    assert_eq!(carol.scene.snapshot(), alice.scene.snapshot());
    Ok(())
}
