//! Last-writer-wins document replica.

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;

use graphsync_core::{
    ChangeAction, DocumentObserver, KeyChange, MapChangeEvent, MapName, ObserverId, Origin,
    Provenance, SharedDocument, SyncResult, Transaction,
};

use crate::update::{parse_map, DocumentUpdate, Stamp, UpdateEntry};
use crate::DocumentError;

/// Receives the encoded update of every local transaction
pub type UpdateHook = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Handle returned by [`InMemoryDocument::on_update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UpdateHookId(pub u64);

#[derive(Debug, Clone)]
struct Register {
    value: Option<Value>,
    stamp: Stamp,
}

#[derive(Debug, Default)]
struct DocState {
    clock: u64,
    maps: BTreeMap<MapName, BTreeMap<String, Register>>,
}

impl DocState {
    fn value(&self, map: MapName, key: &str) -> Option<&Value> {
        self.maps
            .get(&map)
            .and_then(|registers| registers.get(key))
            .and_then(|register| register.value.as_ref())
    }

    /// Write `value` if `stamp` beats the current register. Returns the
    /// resulting change, if the visible state changed.
    fn merge(&mut self, map: MapName, key: &str, value: Option<Value>, stamp: Stamp) -> Option<ChangeAction> {
        self.clock = self.clock.max(stamp.clock);
        let registers = self.maps.entry(map).or_default();

        let had_value = match registers.get(key) {
            Some(current) if current.stamp >= stamp => return None,
            Some(current) => current.value.is_some(),
            None => false,
        };
        let has_value = value.is_some();
        registers.insert(key.to_string(), Register { value, stamp });

        match (had_value, has_value) {
            (false, true) => Some(ChangeAction::Add),
            (true, true) => Some(ChangeAction::Update),
            (true, false) => Some(ChangeAction::Delete),
            (false, false) => None,
        }
    }
}

/// Staged writes of one transaction, applied on commit
struct StagedTransaction<'a> {
    state: &'a DocState,
    writes: Vec<(MapName, String, Option<Value>)>,
}

impl StagedTransaction<'_> {
    fn staged(&self, map: MapName, key: &str) -> Option<&Option<Value>> {
        self.writes
            .iter()
            .rev()
            .find(|(m, k, _)| *m == map && k == key)
            .map(|(_, _, value)| value)
    }
}

impl Transaction for StagedTransaction<'_> {
    fn get(&self, map: MapName, key: &str) -> Option<Value> {
        match self.staged(map, key) {
            Some(value) => value.clone(),
            None => self.state.value(map, key).cloned(),
        }
    }

    fn set(&mut self, map: MapName, key: &str, value: Value) {
        self.writes.push((map, key.to_string(), Some(value)));
    }

    fn delete(&mut self, map: MapName, key: &str) -> bool {
        let existed = self.get(map, key).is_some();
        if existed {
            self.writes.push((map, key.to_string(), None));
        }
        existed
    }
}

/// Collects per-map changes in first-touch key order
#[derive(Default)]
struct ChangeSet {
    changes: BTreeMap<MapName, Vec<KeyChange>>,
}

impl ChangeSet {
    fn record(&mut self, map: MapName, key: &str, action: ChangeAction) {
        self.changes
            .entry(map)
            .or_default()
            .push(KeyChange::new(key, action));
    }

    fn into_events(self, origin: Option<Origin>, provenance: Provenance) -> Vec<MapChangeEvent> {
        self.changes
            .into_iter()
            .map(|(map, changes)| MapChangeEvent {
                map,
                origin: origin.clone(),
                provenance,
                changes,
            })
            .collect()
    }
}

/// In-memory replica of a graph document.
///
/// Observers and update hooks run after the internal lock is released, so
/// they may read or write the document. A transaction closure runs while the
/// lock is held and must only use the [`Transaction`] it is given.
pub struct InMemoryDocument {
    client_id: u64,
    state: Mutex<DocState>,
    observers: RwLock<Vec<(ObserverId, MapName, DocumentObserver)>>,
    update_hooks: RwLock<Vec<(UpdateHookId, UpdateHook)>>,
    next_id: AtomicU64,
}

impl InMemoryDocument {
    /// Create an empty replica with a random client id
    pub fn new() -> Self {
        Self::with_client_id(Uuid::new_v4().as_u128() as u64)
    }

    /// Create an empty replica with a fixed client id
    pub fn with_client_id(client_id: u64) -> Self {
        Self {
            client_id,
            state: Mutex::new(DocState::default()),
            observers: RwLock::new(Vec::new()),
            update_hooks: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    /// Encode every register, tombstones included
    pub fn encode_state_as_update(&self) -> Result<Vec<u8>, DocumentError> {
        let state = self.state.lock();
        let entries = state
            .maps
            .iter()
            .flat_map(|(map, registers)| {
                registers.iter().map(move |(key, register)| UpdateEntry {
                    map: map.as_str().to_string(),
                    key: key.clone(),
                    value: register.value.clone(),
                    stamp: register.stamp,
                })
            })
            .collect();
        DocumentUpdate { entries }.encode()
    }

    /// Merge an update produced by another replica. Observers see the merged
    /// changes with [`Provenance::Remote`] and the given origin.
    pub fn apply_update(&self, bytes: &[u8], origin: Option<Origin>) -> Result<(), DocumentError> {
        let update = DocumentUpdate::decode(bytes)?;
        let parsed = update
            .entries
            .into_iter()
            .map(|entry| -> Result<_, DocumentError> { Ok((parse_map(&entry.map)?, entry)) })
            .collect::<Result<Vec<_>, _>>()?;

        let mut change_set = ChangeSet::default();
        {
            let mut state = self.state.lock();
            for (map, entry) in parsed {
                if let Some(action) = state.merge(map, &entry.key, entry.value, entry.stamp) {
                    change_set.record(map, &entry.key, action);
                }
            }
        }

        let events = change_set.into_events(origin, Provenance::Remote);
        debug!(client_id = self.client_id, maps = events.len(), "Merged remote update");
        self.notify(&events);
        Ok(())
    }

    /// Register a hook receiving the encoded update of each local transaction
    pub fn on_update(&self, hook: UpdateHook) -> UpdateHookId {
        let id = UpdateHookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.update_hooks.write().push((id, hook));
        id
    }

    pub fn off_update(&self, id: UpdateHookId) {
        self.update_hooks.write().retain(|(hook_id, _)| *hook_id != id);
    }

    fn notify(&self, events: &[MapChangeEvent]) {
        for event in events {
            let observers: Vec<DocumentObserver> = self
                .observers
                .read()
                .iter()
                .filter(|(_, map, _)| *map == event.map)
                .map(|(_, _, observer)| observer.clone())
                .collect();
            for observer in observers {
                observer(event);
            }
        }
    }

    fn publish(&self, update: &DocumentUpdate) {
        if update.is_empty() {
            return;
        }
        let hooks: Vec<UpdateHook> = self
            .update_hooks
            .read()
            .iter()
            .map(|(_, hook)| hook.clone())
            .collect();
        if hooks.is_empty() {
            return;
        }

        match update.encode() {
            Ok(bytes) => {
                for hook in hooks {
                    hook(&bytes);
                }
            }
            Err(err) => debug!(error = %err, "Failed to encode local update"),
        }
    }
}

impl Default for InMemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedDocument for InMemoryDocument {
    fn get(&self, map: MapName, key: &str) -> Option<Value> {
        self.state.lock().value(map, key).cloned()
    }

    fn keys(&self, map: MapName) -> Vec<String> {
        self.entries(map).into_iter().map(|(key, _)| key).collect()
    }

    fn entries(&self, map: MapName) -> Vec<(String, Value)> {
        let state = self.state.lock();
        state
            .maps
            .get(&map)
            .map(|registers| {
                registers
                    .iter()
                    .filter_map(|(key, register)| {
                        register.value.clone().map(|value| (key.clone(), value))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn transact(
        &self,
        origin: Option<Origin>,
        f: &mut dyn FnMut(&mut dyn Transaction) -> SyncResult<()>,
    ) -> SyncResult<()> {
        let mut change_set = ChangeSet::default();
        let mut update = DocumentUpdate::default();
        {
            let mut state = self.state.lock();
            let mut txn = StagedTransaction {
                state: &*state,
                writes: Vec::new(),
            };
            f(&mut txn)?;
            let writes = txn.writes;

            // Last write per key wins inside one transaction
            let mut last_writes: Vec<(MapName, String, Option<Value>)> = Vec::new();
            for (map, key, value) in writes {
                match last_writes.iter_mut().find(|(m, k, _)| *m == map && *k == key) {
                    Some(slot) => slot.2 = value,
                    None => last_writes.push((map, key, value)),
                }
            }
            if last_writes.is_empty() {
                return Ok(());
            }

            let stamp = Stamp {
                clock: state.clock + 1,
                client: self.client_id,
            };
            for (map, key, value) in last_writes {
                if let Some(action) = state.merge(map, &key, value.clone(), stamp) {
                    change_set.record(map, &key, action);
                }
                update.entries.push(UpdateEntry {
                    map: map.as_str().to_string(),
                    key,
                    value,
                    stamp,
                });
            }
        }

        trace!(client_id = self.client_id, origin = ?origin, "Committed local transaction");
        let events = change_set.into_events(origin, Provenance::Local);
        self.notify(&events);
        self.publish(&update);
        Ok(())
    }

    fn observe(&self, map: MapName, observer: DocumentObserver) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, map, observer));
        id
    }

    fn unobserve(&self, id: ObserverId) {
        self.observers.write().retain(|(observer_id, _, _)| *observer_id != id);
    }
}
