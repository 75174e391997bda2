use graphsync_core::SceneGraph;
use graphsync_presence::awareness::{AwarenessHub, ListenerId};
use graphsync_presence::{
    AwarenessConfig, AwarenessUser, CollabUser, Cursor, PresenceConfig, PresenceError,
    PresenceManager,
};
use graphsync_test_utils::{MockAwarenessChannel, SceneNodeBuilder};
use graphsync_tests::{connect_all, Peer};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

fn peer_ids(manager: &PresenceManager) -> Vec<String> {
    manager
        .remote_users()
        .into_iter()
        .map(|peer| peer.user.id)
        .collect()
}

#[test]
fn test_peers_appear_and_disappear() {
    let hub = AwarenessHub::new(AwarenessConfig::default());
    let alice = PresenceManager::new(PresenceConfig::default());
    let bob = PresenceManager::new(PresenceConfig::default());

    alice
        .join(Arc::new(hub.connect()), CollabUser::new("alice", "Alice"))
        .unwrap();
    assert!(alice.remote_users().is_empty());

    bob.join(Arc::new(hub.connect()), CollabUser::new("bob", "Bob"))
        .unwrap();
    assert_eq!(peer_ids(&alice), vec!["bob".to_string()]);
    assert_eq!(peer_ids(&bob), vec!["alice".to_string()]);

    bob.leave();
    assert!(alice.remote_users().is_empty());
    assert!(bob.remote_users().is_empty());
    assert_eq!(hub.session_count(), 1);
}

#[test]
fn test_selection_names_a_synced_node() {
    let hub = AwarenessHub::new(AwarenessConfig::default());
    let alice_graph = Peer::new("alice", 1);
    let bob_graph = Peer::new("bob", 2);
    connect_all(&[&alice_graph, &bob_graph]);

    let alice = PresenceManager::new(PresenceConfig::default());
    let bob = PresenceManager::new(PresenceConfig::default());
    alice
        .join(Arc::new(hub.connect()), CollabUser::new("alice", "Alice"))
        .unwrap();
    bob.join(Arc::new(hub.connect()), CollabUser::new("bob", "Bob"))
        .unwrap();

    alice_graph
        .scene
        .add_node(SceneNodeBuilder::new("n1").label("Draft").build())
        .unwrap();
    alice.update_selection(Some("n1")).unwrap();

    let peers = bob.remote_users();
    let selected = peers[0].selected_node_id.as_deref().unwrap();
    assert_eq!(
        bob_graph.scene.get_node(selected).unwrap().data.attributes.label,
        "Draft"
    );
}

#[tokio::test(start_paused = true)]
async fn test_cursor_stream_ends_on_latest_position() {
    let hub = AwarenessHub::new(AwarenessConfig::default());
    let alice = PresenceManager::new(PresenceConfig::default());
    let bob = PresenceManager::new(PresenceConfig::default());
    alice
        .join(Arc::new(hub.connect()), CollabUser::new("alice", "Alice"))
        .unwrap();
    bob.join(Arc::new(hub.connect()), CollabUser::new("bob", "Bob"))
        .unwrap();

    let deliveries = Arc::new(Mutex::new(Vec::<Vec<AwarenessUser>>::new()));
    let sink = deliveries.clone();
    alice.on_peers_changed(Arc::new(move |peers: &[AwarenessUser]| {
        sink.lock().push(peers.to_vec())
    }));
    tokio::time::advance(Duration::from_millis(100)).await;

    for step in 0..20 {
        bob.update_cursor(step as f64, 10.0).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    let deliveries = deliveries.lock();
    assert!(deliveries.len() < 20);
    assert_eq!(
        deliveries.last().unwrap()[0].cursor,
        Some(Cursor { x: 19.0, y: 10.0 })
    );
}

#[tokio::test(start_paused = true)]
async fn test_silent_sessions_are_pruned() {
    let hub = AwarenessHub::new(AwarenessConfig {
        liveness_timeout_ms: 1_000,
    });
    let alice = PresenceManager::new(PresenceConfig::default());
    let bob = PresenceManager::new(PresenceConfig::default());
    alice
        .join(Arc::new(hub.connect_with_id(1)), CollabUser::new("alice", "Alice"))
        .unwrap();
    bob.join(Arc::new(hub.connect_with_id(2)), CollabUser::new("bob", "Bob"))
        .unwrap();

    tokio::time::advance(Duration::from_millis(1_500)).await;
    hub.heartbeat(1);
    let pruned = hub.prune_stale(tokio::time::Instant::now());

    assert_eq!(pruned, vec![2]);
    assert!(alice.remote_users().is_empty());
}

#[test]
fn test_join_publishes_identity_with_palette_color() {
    let published = Arc::new(Mutex::new(Vec::<(String, Value)>::new()));
    let sink = published.clone();

    let mut channel = MockAwarenessChannel::new();
    channel.expect_client_id().return_const(7u64);
    channel
        .expect_set_local_state_field()
        .times(1)
        .returning(move |field, value| {
            sink.lock().push((field.to_string(), value));
            Ok(())
        });
    channel
        .expect_on_change()
        .times(1)
        .returning(|_| ListenerId(3));
    channel.expect_get_states().returning(|| {
        let carol = json!({
            "user": {"id": "carol", "name": "Carol", "color": "#10b981"},
            "cursor": {"x": 4.0, "y": 2.0},
        });
        let mut states = BTreeMap::new();
        states.insert(7, serde_json::Map::new());
        if let Value::Object(state) = carol {
            states.insert(9, state);
        }
        states
    });
    channel.expect_off_change().times(1).return_const(());

    let manager = PresenceManager::new(PresenceConfig::default());
    manager
        .join(Arc::new(channel), CollabUser::new("bob", "Bob"))
        .unwrap();

    let published = published.lock().clone();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "user");
    assert_eq!(published[0].1["color"], json!("#ec4899"));

    let peers = manager.remote_users();
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].user.id, "carol");
    assert_eq!(peers[0].cursor, Some(Cursor { x: 4.0, y: 2.0 }));

    manager.leave();
    assert!(!manager.is_joined());
}

#[test]
fn test_channel_failure_is_reported() {
    let mut channel = MockAwarenessChannel::new();
    channel
        .expect_set_local_state_field()
        .returning(|_, _| Err(PresenceError::Channel("socket closed".into())));
    channel.expect_on_change().never();

    let manager = PresenceManager::new(PresenceConfig::default());
    let result = manager.join(Arc::new(channel), CollabUser::new("bob", "Bob"));

    assert_eq!(result, Err(PresenceError::Channel("socket closed".into())));
    assert!(!manager.is_joined());
    assert_eq!(manager.update_cursor(1.0, 1.0), Err(PresenceError::NotJoined));
}
