//! Publishes local presence and delivers the peer list to the UI.

use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use graphsync_monitoring::PresenceMetrics;

use crate::awareness::{AwarenessChange, AwarenessChannel, AwarenessState, ListenerId};
use crate::config::PresenceConfig;
use crate::throttle::{CursorThrottle, ThrottleDecision};
use crate::user::{user_color, AwarenessUser, CollabUser, Cursor};
use crate::{PresenceError, PresenceResult};

const FIELD_USER: &str = "user";
const FIELD_CURSOR: &str = "cursor";
const FIELD_SELECTED_NODE: &str = "selectedNodeId";

/// Receives the current peer list, local session excluded
pub type PeersCallback = Arc<dyn Fn(&[AwarenessUser]) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

struct Session {
    channel: Arc<dyn AwarenessChannel>,
    listener: ListenerId,
    user: CollabUser,
}

struct PresenceInner {
    config: PresenceConfig,
    session: RwLock<Option<Session>>,
    peers: Mutex<Vec<AwarenessUser>>,
    throttle: Mutex<CursorThrottle>,
    subscribers: RwLock<Vec<(SubscriptionId, PeersCallback)>>,
    next_subscription: AtomicU64,
}

/// Presence for one local session.
///
/// Identity changes (a peer joining or leaving, or changing name, color,
/// avatar or selection) are delivered immediately. Cursor-only changes are
/// throttled to one delivery per `cursor_throttle_ms`, with a trailing
/// delivery carrying the latest positions. Trailing deliveries need a tokio
/// runtime; without one, cursor changes are delivered immediately.
pub struct PresenceManager {
    inner: Arc<PresenceInner>,
}

impl PresenceManager {
    pub fn new(config: PresenceConfig) -> Self {
        let throttle = CursorThrottle::new(config.cursor_throttle());
        Self {
            inner: Arc::new(PresenceInner {
                config,
                session: RwLock::new(None),
                peers: Mutex::new(Vec::new()),
                throttle: Mutex::new(throttle),
                subscribers: RwLock::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
            }),
        }
    }

    /// Publish `user` on `channel` and start observing peers. A user without
    /// a color gets one derived from its id.
    pub fn join(&self, channel: Arc<dyn AwarenessChannel>, mut user: CollabUser) -> PresenceResult<()> {
        self.leave();

        if user.color.is_empty() {
            if let Some(color) = user_color(&user.id, &self.inner.config.palette) {
                user.color = color.to_string();
            }
        }
        channel.set_local_state_field(FIELD_USER, serde_json::to_value(&user)?)?;

        let weak: Weak<PresenceInner> = Arc::downgrade(&self.inner);
        let listener = channel.on_change(Arc::new(move |_: &AwarenessChange| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_change();
            }
        }));

        info!(user_id = %user.id, client_id = channel.client_id(), "Joined presence session");
        *self.inner.session.write() = Some(Session {
            channel,
            listener,
            user,
        });
        self.inner.handle_change();
        Ok(())
    }

    /// Stop observing peers. The peer list becomes empty.
    pub fn leave(&self) {
        let Some(session) = self.inner.session.write().take() else {
            return;
        };
        session.channel.off_change(session.listener);
        self.inner.throttle.lock().reset();
        info!(user_id = %session.user.id, "Left presence session");

        let had_peers = !self.inner.peers.lock().is_empty();
        if had_peers {
            self.inner.deliver(Vec::new(), false);
        }
    }

    pub fn update_cursor(&self, x: f64, y: f64) -> PresenceResult<()> {
        let cursor = serde_json::to_value(Cursor { x, y })?;
        self.inner.channel()?.set_local_state_field(FIELD_CURSOR, cursor)
    }

    /// Publish the selected node, or clear it with `None`
    pub fn update_selection(&self, node_id: Option<&str>) -> PresenceResult<()> {
        let value = node_id.map_or(Value::Null, |id| json!(id));
        self.inner.channel()?.set_local_state_field(FIELD_SELECTED_NODE, value)
    }

    /// The last delivered peer list
    pub fn remote_users(&self) -> Vec<AwarenessUser> {
        self.inner.peers.lock().clone()
    }

    pub fn local_user(&self) -> Option<CollabUser> {
        self.inner.session.read().as_ref().map(|s| s.user.clone())
    }

    pub fn is_joined(&self) -> bool {
        self.inner.session.read().is_some()
    }

    pub fn on_peers_changed(&self, callback: PeersCallback) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.inner.subscribers.write().push((id, callback));
        id
    }

    pub fn off_peers_changed(&self, id: SubscriptionId) {
        self.inner.subscribers.write().retain(|(sub, _)| *sub != id);
    }
}

impl Drop for PresenceManager {
    fn drop(&mut self) {
        self.leave();
    }
}

impl PresenceInner {
    fn channel(&self) -> PresenceResult<Arc<dyn AwarenessChannel>> {
        self.session
            .read()
            .as_ref()
            .map(|s| s.channel.clone())
            .ok_or(PresenceError::NotJoined)
    }

    /// Peers in client id order, skipping this session and states without a
    /// decodable user
    fn collect_peers(&self) -> Option<Vec<AwarenessUser>> {
        let channel = self.channel().ok()?;
        let own_id = channel.client_id();

        let peers = channel
            .get_states()
            .into_iter()
            .filter(|(client_id, _)| *client_id != own_id)
            .filter_map(|(client_id, state)| decode_peer(client_id, &state))
            .collect();
        Some(peers)
    }

    fn handle_change(self: &Arc<Self>) {
        let Some(peers) = self.collect_peers() else {
            return;
        };

        let cursor_only = {
            let previous = self.peers.lock();
            if *previous == peers {
                return;
            }
            previous.len() == peers.len()
                && previous.iter().zip(&peers).all(|(a, b)| a.same_identity(b))
        };

        if !cursor_only {
            self.throttle.lock().mark_emitted(Instant::now());
            self.deliver(peers, false);
            return;
        }

        let decision = self.throttle.lock().on_cursor_change(Instant::now());
        match decision {
            ThrottleDecision::EmitNow => {
                self.throttle.lock().mark_emitted(Instant::now());
                self.deliver(peers, true);
            }
            ThrottleDecision::Schedule {
                deadline,
                generation,
            } => self.schedule_trailing(deadline, generation, peers),
            ThrottleDecision::Coalesced => PresenceMetrics::record_cursor_coalesced(),
        }
    }

    fn schedule_trailing(
        self: &Arc<Self>,
        deadline: Instant,
        generation: u64,
        peers: Vec<AwarenessUser>,
    ) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let weak = Arc::downgrade(self);
                handle.spawn(async move {
                    tokio::time::sleep_until(deadline).await;
                    if let Some(inner) = weak.upgrade() {
                        inner.flush_trailing(generation);
                    }
                });
            }
            Err(_) => {
                debug!("No runtime for trailing cursor delivery, delivering now");
                self.throttle.lock().mark_emitted(Instant::now());
                self.deliver(peers, true);
            }
        }
    }

    fn flush_trailing(&self, generation: u64) {
        if !self.throttle.lock().take_pending(generation, Instant::now()) {
            return;
        }
        let Some(peers) = self.collect_peers() else {
            return;
        };
        if *self.peers.lock() != peers {
            self.deliver(peers, true);
        }
    }

    fn deliver(&self, peers: Vec<AwarenessUser>, cursor_only: bool) {
        *self.peers.lock() = peers.clone();

        let subscribers: Vec<PeersCallback> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in subscribers {
            callback(&peers);
        }
        PresenceMetrics::record_peers_delivered(peers.len(), cursor_only);
    }
}

fn decode_peer(client_id: u64, state: &AwarenessState) -> Option<AwarenessUser> {
    let user: CollabUser = match serde_json::from_value(state.get(FIELD_USER)?.clone()) {
        Ok(user) => user,
        Err(err) => {
            warn!(client_id, error = %err, "Ignoring peer with malformed user state");
            return None;
        }
    };

    let cursor = state
        .get(FIELD_CURSOR)
        .and_then(|value| serde_json::from_value::<Cursor>(value.clone()).ok());
    let selected_node_id = state
        .get(FIELD_SELECTED_NODE)
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(AwarenessUser {
        user,
        cursor,
        selected_node_id,
    })
}
