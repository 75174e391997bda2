//! The replicated layout mode held in `meta.layoutMode`.

use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

use graphsync_monitoring::SyncMetrics;

use super::context::{LayoutModeCallback, SyncContext};
use crate::domain::document::{MapName, LOCAL_ORIGIN};
use crate::domain::edge_style::resolve_edge_style;
use crate::domain::records::{decode_layout_mode, META_LAYOUT_MODE};
use crate::domain::scene::SceneGraph;
use crate::error::SyncResult;
use crate::types::LayoutMode;

pub struct LayoutModeChannel {
    ctx: Arc<SyncContext>,
}

impl LayoutModeChannel {
    pub(crate) fn new(ctx: Arc<SyncContext>) -> Self {
        Self { ctx }
    }

    /// Commit a new mode and restyle the local edges for it
    pub fn set_mode(&self, mode: LayoutMode) -> SyncResult<()> {
        let document = self.ctx.document()?;
        let scene = self.ctx.scene()?;

        document.transact(Some(LOCAL_ORIGIN), &mut |txn| {
            txn.set(MapName::Meta, META_LAYOUT_MODE, Value::from(mode.as_str()));
            Ok(())
        })?;
        SyncMetrics::record_local_commit(MapName::Meta.as_str(), META_LAYOUT_MODE, "upsert");

        let restyled = self.restyle_edges(&*scene, Some(mode));
        info!(mode = %mode, restyled, "Layout mode set");
        Ok(())
    }

    /// The stored mode; `None` when unset or unrecognized
    pub fn get_mode(&self) -> SyncResult<Option<LayoutMode>> {
        let document = self.ctx.document()?;
        let Some(value) = document.get(MapName::Meta, META_LAYOUT_MODE) else {
            return Ok(None);
        };

        let mode = decode_layout_mode(&value);
        if mode.is_none() {
            warn!(value = %value, "Stored layout mode is not recognized");
        }
        Ok(mode)
    }

    /// Register the callback invoked when a peer changes the mode
    pub fn on_remote_mode_change(&self, callback: LayoutModeCallback) {
        self.ctx.set_layout_callback(Some(callback));
    }

    /// Recompute every edge style for `mode`, changing only edges whose style
    /// differs. Returns the number of edges restyled.
    pub(crate) fn restyle_edges(&self, scene: &dyn SceneGraph, mode: Option<LayoutMode>) -> usize {
        let _scope = self.ctx.guard.enter_remote_apply();
        let mut restyled = 0;

        for edge in scene.edges() {
            let style = resolve_edge_style(&edge.data.normalized_metadata(), mode);
            if edge.style == style {
                continue;
            }
            match scene.set_edge_style(&edge.id, style) {
                Ok(()) => restyled += 1,
                Err(err) => warn!(edge_id = %edge.id, error = %err, "Failed to restyle edge"),
            }
        }
        restyled
    }

    /// Invoke the registered callback. A panicking callback is logged and
    /// contained.
    pub(crate) fn notify_remote_change(&self, mode: LayoutMode) {
        let Some(callback) = self.ctx.layout_callback() else {
            debug!(mode = %mode, "No layout mode callback registered");
            return;
        };

        if catch_unwind(AssertUnwindSafe(|| callback(mode))).is_err() {
            warn!(mode = %mode, "Layout mode callback panicked");
        }
    }
}
