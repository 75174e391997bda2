//! Metric events for the sync engine, recorded as structured tracing events.

use tracing::{debug, info};

/// Tracing target used for every metric event
pub const METRICS_TARGET: &str = "graphsync::metrics";

/// Sync engine metrics
pub struct SyncMetrics;

impl SyncMetrics {
    /// Record a transaction committed by the local change translator
    pub fn record_local_commit(map: &str, key: &str, operation: &str) {
        debug!(target: METRICS_TARGET, metric = "local_commit", map, key, operation);
    }

    /// Record a bulk republish of every scene node
    pub fn record_bulk_sync(node_count: usize) {
        info!(target: METRICS_TARGET, metric = "bulk_sync", node_count);
    }

    /// Record a remote change applied to the scene graph
    pub fn record_remote_apply(map: &str, key: &str, action: &str) {
        debug!(target: METRICS_TARGET, metric = "remote_apply", map, key, action);
    }

    /// Record a change batch skipped because it carried the local origin
    pub fn record_echo_skipped(map: &str, change_count: usize) {
        debug!(target: METRICS_TARGET, metric = "echo_skipped", map, change_count);
    }

    /// Record an entity skipped because it was missing or malformed
    pub fn record_entity_skipped(map: &str, key: &str, reason: &str) {
        info!(target: METRICS_TARGET, metric = "entity_skipped", map, key, reason);
    }

    /// Record the initial document load into an empty scene graph
    pub fn record_initial_load(node_count: usize, edge_count: usize) {
        info!(target: METRICS_TARGET, metric = "initial_load", node_count, edge_count);
    }
}

/// Presence layer metrics
pub struct PresenceMetrics;

impl PresenceMetrics {
    /// Record a peer list delivered to subscribers
    pub fn record_peers_delivered(peer_count: usize, cursor_only: bool) {
        debug!(target: METRICS_TARGET, metric = "peers_delivered", peer_count, cursor_only);
    }

    /// Record a cursor-only update folded into a pending throttled delivery
    pub fn record_cursor_coalesced() {
        debug!(target: METRICS_TARGET, metric = "cursor_coalesced");
    }
}
