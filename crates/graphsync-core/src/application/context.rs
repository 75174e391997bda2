//! State shared by the translator, the applier and the layout channel of one
//! sync session.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use super::origin_guard::OriginGuard;
use crate::config::SyncConfig;
use crate::domain::document::{MapName, SharedDocument};
use crate::domain::records::{decode_layout_mode, META_LAYOUT_MODE};
use crate::domain::scene::SceneGraph;
use crate::error::{SyncError, SyncResult};
use crate::types::LayoutMode;

/// Invoked with the new mode when a peer changes the layout mode
pub type LayoutModeCallback = Arc<dyn Fn(LayoutMode) + Send + Sync>;

pub(crate) struct SyncContext {
    pub(crate) config: SyncConfig,
    pub(crate) guard: OriginGuard,
    scene: RwLock<Option<Arc<dyn SceneGraph>>>,
    document: RwLock<Option<Arc<dyn SharedDocument>>>,
    layout_callback: RwLock<Option<LayoutModeCallback>>,
    deferred_edges: Mutex<Vec<String>>,
}

impl SyncContext {
    pub(crate) fn new(config: SyncConfig) -> Self {
        Self {
            config,
            guard: OriginGuard::new(),
            scene: RwLock::new(None),
            document: RwLock::new(None),
            layout_callback: RwLock::new(None),
            deferred_edges: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn attach(
        &self,
        scene: Arc<dyn SceneGraph>,
        document: Arc<dyn SharedDocument>,
        layout_callback: Option<LayoutModeCallback>,
    ) {
        *self.scene.write() = Some(scene);
        *self.document.write() = Some(document);
        *self.layout_callback.write() = layout_callback;
    }

    pub(crate) fn detach(&self) {
        self.scene.write().take();
        self.document.write().take();
        self.layout_callback.write().take();
        self.deferred_edges.lock().clear();
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.scene.read().is_some() && self.document.read().is_some()
    }

    pub(crate) fn scene(&self) -> SyncResult<Arc<dyn SceneGraph>> {
        self.scene.read().clone().ok_or(SyncError::NotInitialized)
    }

    pub(crate) fn document(&self) -> SyncResult<Arc<dyn SharedDocument>> {
        self.document.read().clone().ok_or(SyncError::NotInitialized)
    }

    pub(crate) fn layout_callback(&self) -> Option<LayoutModeCallback> {
        self.layout_callback.read().clone()
    }

    pub(crate) fn set_layout_callback(&self, callback: Option<LayoutModeCallback>) {
        *self.layout_callback.write() = callback;
    }

    /// Layout mode currently stored in the document, `None` when unset
    pub(crate) fn current_layout_mode(&self, document: &dyn SharedDocument) -> Option<LayoutMode> {
        document
            .get(MapName::Meta, META_LAYOUT_MODE)
            .and_then(|value| decode_layout_mode(&value))
    }

    /// Queue an edge for a deferred data commit; repeated ids are coalesced
    pub(crate) fn defer_edge(&self, edge_id: &str) {
        let mut queue = self.deferred_edges.lock();
        if !queue.iter().any(|queued| queued == edge_id) {
            queue.push(edge_id.to_string());
        }
    }

    pub(crate) fn take_deferred_edges(&self) -> Vec<String> {
        std::mem::take(&mut *self.deferred_edges.lock())
    }
}
