//! The per-session sync engine exposed to the UI shell.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

use super::context::{LayoutModeCallback, SyncContext};
use super::layout_channel::LayoutModeChannel;
use super::local_translator::LocalChangeTranslator;
use super::remote_applier::{LoadSummary, RemoteChangeApplier};
use crate::config::SyncConfig;
use crate::domain::document::{MapChangeEvent, MapName, ObserverId, SharedDocument};
use crate::domain::scene::{ListenerId, SceneEvent, SceneGraph};
use crate::error::SyncResult;
use crate::types::LayoutMode;

#[derive(Default)]
struct Registrations {
    scene_listener: Option<ListenerId>,
    document_observers: Vec<ObserverId>,
}

/// Keeps one scene graph and one shared document in sync.
///
/// One manager serves one session; several managers may run side by side in
/// a process without sharing state. Dropping the manager detaches it.
pub struct GraphSyncManager {
    ctx: Arc<SyncContext>,
    translator: Arc<LocalChangeTranslator>,
    applier: Arc<RemoteChangeApplier>,
    layout: LayoutModeChannel,
    registrations: Mutex<Registrations>,
}

impl GraphSyncManager {
    pub fn new(config: SyncConfig) -> Self {
        let ctx = Arc::new(SyncContext::new(config));
        Self {
            translator: Arc::new(LocalChangeTranslator::new(ctx.clone())),
            applier: Arc::new(RemoteChangeApplier::new(ctx.clone())),
            layout: LayoutModeChannel::new(ctx.clone()),
            ctx,
            registrations: Mutex::new(Registrations::default()),
        }
    }

    /// Attach to a scene graph and a document and start syncing.
    /// Re-initializing detaches from the previous pair first.
    pub fn initialize(
        &self,
        scene: Arc<dyn SceneGraph>,
        document: Arc<dyn SharedDocument>,
        on_layout_mode_change: Option<LayoutModeCallback>,
    ) -> SyncResult<()> {
        self.ctx.config.validate()?;
        if self.is_initialized() {
            self.destroy();
        }

        self.ctx
            .attach(scene.clone(), document.clone(), on_layout_mode_change);

        let translator = Arc::downgrade(&self.translator);
        let scene_listener = scene.subscribe(Arc::new(move |event: &SceneEvent| {
            if let Some(translator) = translator.upgrade() {
                translator.handle_event(event);
            }
        }));

        let document_observers = MapName::ALL
            .into_iter()
            .map(|map| {
                let applier = Arc::downgrade(&self.applier);
                document.observe(
                    map,
                    Arc::new(move |event: &MapChangeEvent| {
                        if let Some(applier) = applier.upgrade() {
                            applier.handle_event(event);
                        }
                    }),
                )
            })
            .collect();

        *self.registrations.lock() = Registrations {
            scene_listener: Some(scene_listener),
            document_observers,
        };

        info!("Graph sync initialized");
        Ok(())
    }

    /// Remove every listener and observer and drop the scene graph and
    /// document references. Safe to call more than once.
    pub fn destroy(&self) {
        let registrations = std::mem::take(&mut *self.registrations.lock());

        if let (Some(id), Ok(scene)) = (registrations.scene_listener, self.ctx.scene()) {
            scene.unsubscribe(id);
        }
        if let Ok(document) = self.ctx.document() {
            for id in registrations.document_observers {
                document.unobserve(id);
            }
        }

        if self.ctx.is_attached() {
            self.ctx.detach();
            info!("Graph sync destroyed");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.ctx.is_attached()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.ctx.config
    }

    pub fn set_layout_mode(&self, mode: LayoutMode) -> SyncResult<()> {
        self.layout.set_mode(mode)
    }

    /// The document's layout mode; `None` when unset or not initialized
    pub fn get_layout_mode(&self) -> Option<LayoutMode> {
        self.layout.get_mode().ok().flatten()
    }

    /// Replace the layout mode callback
    pub fn on_layout_mode_change(&self, callback: LayoutModeCallback) {
        self.layout.on_remote_mode_change(callback);
    }

    /// Republish every scene node. Returns the number of nodes written.
    pub fn sync_all_nodes_to_document(&self) -> SyncResult<usize> {
        self.translator.sync_all_nodes()
    }

    /// Apply the entire document to the scene graph
    pub fn load_initial_state(&self) -> SyncResult<LoadSummary> {
        self.applier.load_document()
    }

    /// Commit edge-data changes queued while `defer_edge_data_commits` is on
    pub fn flush_deferred(&self) -> usize {
        self.translator.flush_deferred()
    }
}

impl Drop for GraphSyncManager {
    fn drop(&mut self) {
        self.destroy();
    }
}
