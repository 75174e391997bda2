//! The awareness channel seam and an in-memory hub implementing it.
//!
//! Each connected session owns one state object, keyed by its client id. A
//! session only ever writes its own state; every state change, join and leave
//! is broadcast to all listeners.

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AwarenessConfig;
use crate::PresenceResult;

/// Identifier of one connected session
pub type ClientId = u64;

/// Fields published by one session
pub type AwarenessState = Map<String, Value>;

/// Sessions affected by one awareness change
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AwarenessChange {
    pub added: Vec<ClientId>,
    pub updated: Vec<ClientId>,
    pub removed: Vec<ClientId>,
}

impl AwarenessChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

pub type AwarenessListener = Arc<dyn Fn(&AwarenessChange) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Ephemeral per-session state shared with peers
pub trait AwarenessChannel: Send + Sync {
    /// This session's id
    fn client_id(&self) -> ClientId;

    /// Set one field of this session's state
    fn set_local_state_field(&self, field: &str, value: Value) -> PresenceResult<()>;

    /// States of every connected session, this one included
    fn get_states(&self) -> BTreeMap<ClientId, AwarenessState>;

    fn on_change(&self, listener: AwarenessListener) -> ListenerId;

    fn off_change(&self, id: ListenerId);
}

struct Session {
    state: AwarenessState,
    last_seen: Instant,
}

/// In-process awareness server. Sessions connect through [`HubChannel`]s.
pub struct AwarenessHub {
    config: AwarenessConfig,
    sessions: Mutex<BTreeMap<ClientId, Session>>,
    listeners: RwLock<Vec<(ListenerId, AwarenessListener)>>,
    next_listener: AtomicU64,
}

impl AwarenessHub {
    pub fn new(config: AwarenessConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            sessions: Mutex::new(BTreeMap::new()),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        })
    }

    /// Connect a new session with a random client id
    pub fn connect(self: &Arc<Self>) -> HubChannel {
        self.connect_with_id(Uuid::new_v4().as_u128() as u64)
    }

    /// Connect a session with a fixed client id
    pub fn connect_with_id(self: &Arc<Self>, client_id: ClientId) -> HubChannel {
        self.sessions.lock().insert(
            client_id,
            Session {
                state: AwarenessState::new(),
                last_seen: Instant::now(),
            },
        );
        debug!(client_id, "Awareness session connected");
        self.emit(AwarenessChange {
            added: vec![client_id],
            ..AwarenessChange::default()
        });

        HubChannel {
            hub: self.clone(),
            client_id,
        }
    }

    /// Remove a session immediately. Returns whether it was connected.
    pub fn disconnect(&self, client_id: ClientId) -> bool {
        let removed = self.sessions.lock().remove(&client_id).is_some();
        if removed {
            debug!(client_id, "Awareness session disconnected");
            self.emit(AwarenessChange {
                removed: vec![client_id],
                ..AwarenessChange::default()
            });
        }
        removed
    }

    /// Mark a session as alive without changing its state
    pub fn heartbeat(&self, client_id: ClientId) {
        if let Some(session) = self.sessions.lock().get_mut(&client_id) {
            session.last_seen = Instant::now();
        }
    }

    /// Drop every session not seen within the liveness timeout before `now`.
    /// Returns the removed client ids.
    pub fn prune_stale(&self, now: Instant) -> Vec<ClientId> {
        let timeout = self.config.liveness_timeout();
        let removed: Vec<ClientId> = {
            let mut sessions = self.sessions.lock();
            let stale: Vec<ClientId> = sessions
                .iter()
                .filter(|(_, session)| now.saturating_duration_since(session.last_seen) > timeout)
                .map(|(id, _)| *id)
                .collect();
            for id in &stale {
                sessions.remove(id);
            }
            stale
        };

        if !removed.is_empty() {
            info!(count = removed.len(), "Pruned stale awareness sessions");
            self.emit(AwarenessChange {
                removed: removed.clone(),
                ..AwarenessChange::default()
            });
        }
        removed
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    fn set_field(&self, client_id: ClientId, field: &str, value: Value) -> PresenceResult<()> {
        {
            let mut sessions = self.sessions.lock();
            let session = sessions
                .get_mut(&client_id)
                .ok_or_else(|| crate::PresenceError::Channel(format!("session {} is not connected", client_id)))?;
            session.state.insert(field.to_string(), value);
            session.last_seen = Instant::now();
        }

        self.emit(AwarenessChange {
            updated: vec![client_id],
            ..AwarenessChange::default()
        });
        Ok(())
    }

    fn states(&self) -> BTreeMap<ClientId, AwarenessState> {
        self.sessions
            .lock()
            .iter()
            .map(|(id, session)| (*id, session.state.clone()))
            .collect()
    }

    fn add_listener(&self, listener: AwarenessListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.write().retain(|(listener_id, _)| *listener_id != id);
    }

    fn emit(&self, change: AwarenessChange) {
        let listeners: Vec<AwarenessListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&change);
        }
    }
}

/// One session's connection to an [`AwarenessHub`]. Dropping it disconnects
/// the session.
pub struct HubChannel {
    hub: Arc<AwarenessHub>,
    client_id: ClientId,
}

impl HubChannel {
    pub fn hub(&self) -> &Arc<AwarenessHub> {
        &self.hub
    }
}

impl AwarenessChannel for HubChannel {
    fn client_id(&self) -> ClientId {
        self.client_id
    }

    fn set_local_state_field(&self, field: &str, value: Value) -> PresenceResult<()> {
        self.hub.set_field(self.client_id, field, value)
    }

    fn get_states(&self) -> BTreeMap<ClientId, AwarenessState> {
        self.hub.states()
    }

    fn on_change(&self, listener: AwarenessListener) -> ListenerId {
        self.hub.add_listener(listener)
    }

    fn off_change(&self, id: ListenerId) {
        self.hub.remove_listener(id);
    }
}

impl Drop for HubChannel {
    fn drop(&mut self) {
        self.hub.disconnect(self.client_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn record(hub: &AwarenessHub) -> Arc<Mutex<Vec<AwarenessChange>>> {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        hub.add_listener(Arc::new(move |change: &AwarenessChange| sink.lock().push(change.clone())));
        changes
    }

    #[test]
    fn test_sessions_write_only_their_own_state() {
        let hub = AwarenessHub::new(AwarenessConfig::default());
        let a = hub.connect_with_id(1);
        let b = hub.connect_with_id(2);

        a.set_local_state_field("cursor", json!({"x": 1, "y": 2})).unwrap();

        let states = b.get_states();
        assert_eq!(states.len(), 2);
        assert_eq!(states[&1]["cursor"], json!({"x": 1, "y": 2}));
        assert!(states[&2].is_empty());
    }

    #[test]
    fn test_join_update_and_leave_emit_changes() {
        let hub = AwarenessHub::new(AwarenessConfig::default());
        let changes = record(&hub);

        let a = hub.connect_with_id(7);
        a.set_local_state_field("selectedNodeId", json!("n1")).unwrap();
        drop(a);

        let changes = changes.lock();
        assert_eq!(changes[0].added, vec![7]);
        assert_eq!(changes[1].updated, vec![7]);
        assert_eq!(changes[2].removed, vec![7]);
        assert_eq!(hub.session_count(), 0);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let hub = AwarenessHub::new(AwarenessConfig::default());
        let _a = hub.connect_with_id(1);

        assert!(hub.disconnect(1));
        assert!(!hub.disconnect(1));
    }

    #[test]
    fn test_writes_after_disconnect_fail() {
        let hub = AwarenessHub::new(AwarenessConfig::default());
        let a = hub.connect_with_id(1);
        hub.disconnect(1);

        assert!(matches!(
            a.set_local_state_field("cursor", json!(null)),
            Err(crate::PresenceError::Channel(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_stale_drops_silent_sessions() {
        let hub = AwarenessHub::new(AwarenessConfig {
            liveness_timeout_ms: 1_000,
        });
        let _quiet = hub.connect_with_id(1);
        let chatty = hub.connect_with_id(2);
        let changes = record(&hub);

        tokio::time::advance(Duration::from_millis(800)).await;
        chatty.set_local_state_field("cursor", json!({"x": 0, "y": 0})).unwrap();
        tokio::time::advance(Duration::from_millis(400)).await;

        assert_eq!(hub.prune_stale(Instant::now()), vec![1]);
        assert_eq!(hub.session_count(), 1);
        assert_eq!(changes.lock().last().unwrap().removed, vec![1]);

        tokio::time::advance(Duration::from_millis(500)).await;
        hub.heartbeat(2);
        tokio::time::advance(Duration::from_millis(900)).await;
        assert!(hub.prune_stale(Instant::now()).is_empty());
    }
}
