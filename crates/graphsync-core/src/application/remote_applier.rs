//! Document change events to scene graph mutations.
//!
//! Every apply runs inside an [`OriginGuard`](super::OriginGuard) scope so the
//! scene events it raises are not translated back into the document. Each key
//! of a batch is applied independently: a failure is logged and the rest of
//! the batch still applies.

use std::sync::Arc;
use tracing::{debug, info, warn};

use graphsync_monitoring::SyncMetrics;

use super::context::SyncContext;
use super::layout_channel::LayoutModeChannel;
use crate::domain::document::{ChangeAction, KeyChange, MapChangeEvent, MapName, SharedDocument};
use crate::domain::edge_style::resolve_edge_style;
use crate::domain::records::{decode_layout_mode, EdgeRecord, NodeRecord, META_LAYOUT_MODE};
use crate::domain::scene::{EdgeData, LocalUiState, NodeData, SceneEdge, SceneGraph, SceneNode};
use crate::error::{SyncError, SyncResult};
use crate::types::LayoutMode;

/// Counts of entities applied by [`RemoteChangeApplier::load_document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadSummary {
    pub nodes: usize,
    pub edges: usize,
    pub layout_mode: Option<LayoutMode>,
}

pub struct RemoteChangeApplier {
    ctx: Arc<SyncContext>,
    layout: LayoutModeChannel,
}

impl RemoteChangeApplier {
    pub(crate) fn new(ctx: Arc<SyncContext>) -> Self {
        Self {
            layout: LayoutModeChannel::new(ctx.clone()),
            ctx,
        }
    }

    /// Apply one observed change batch
    pub fn handle_event(&self, event: &MapChangeEvent) {
        if event.is_local_origin() {
            SyncMetrics::record_echo_skipped(event.map.as_str(), event.changes.len());
            return;
        }

        let (scene, document) = match (self.ctx.scene(), self.ctx.document()) {
            (Ok(scene), Ok(document)) => (scene, document),
            _ => {
                debug!(map = %event.map, "Engine detached, dropping change batch");
                return;
            }
        };

        let mut remote_mode = None;
        {
            let _scope = self.ctx.guard.enter_remote_apply();
            for change in &event.changes {
                let result = match event.map {
                    MapName::Nodes => self.apply_node_change(&*scene, &*document, change),
                    MapName::Edges => self.apply_edge_change(&*scene, &*document, change),
                    MapName::Meta => self
                        .apply_meta_change(&*scene, &*document, change)
                        .map(|mode| remote_mode = mode.or(remote_mode)),
                };
                self.report(event.map, change, result);
            }
        }

        if let Some(mode) = remote_mode {
            self.layout.notify_remote_change(mode);
        }
    }

    /// Apply the whole document to the scene graph: nodes, then edges, then
    /// report the layout mode to the callback
    pub fn load_document(&self) -> SyncResult<LoadSummary> {
        let scene = self.ctx.scene()?;
        let document = self.ctx.document()?;
        let mut summary = LoadSummary {
            layout_mode: self.ctx.current_layout_mode(&*document),
            ..LoadSummary::default()
        };

        {
            let _scope = self.ctx.guard.enter_remote_apply();

            for (key, value) in document.entries(MapName::Nodes) {
                let result = NodeRecord::from_value(&key, &value)
                    .and_then(|record| self.upsert_node(&*scene, &record));
                if self.report_load(MapName::Nodes, &key, result) {
                    summary.nodes += 1;
                }
            }

            for (key, value) in document.entries(MapName::Edges) {
                let result = EdgeRecord::from_value(&key, &value)
                    .and_then(|record| self.upsert_edge(&*scene, &record, summary.layout_mode));
                if self.report_load(MapName::Edges, &key, result) {
                    summary.edges += 1;
                }
            }
        }

        SyncMetrics::record_initial_load(summary.nodes, summary.edges);
        info!(nodes = summary.nodes, edges = summary.edges, "Loaded initial document state");

        if let Some(mode) = summary.layout_mode {
            self.layout.notify_remote_change(mode);
        }
        Ok(summary)
    }

    fn apply_node_change(
        &self,
        scene: &dyn SceneGraph,
        document: &dyn SharedDocument,
        change: &KeyChange,
    ) -> SyncResult<()> {
        if change.action == ChangeAction::Delete {
            if scene.get_node(&change.key).is_some() {
                scene.remove_cell(&change.key);
            } else {
                debug!(node_id = %change.key, "Removed node already absent");
            }
            return Ok(());
        }

        let value = document
            .get(MapName::Nodes, &change.key)
            .ok_or_else(|| missing("node", &change.key))?;
        let record = NodeRecord::from_value(&change.key, &value)?;
        let added = scene.get_node(&record.id).is_none();
        self.upsert_node(scene, &record)?;
        if added {
            self.attach_pending_edges(scene, document, &record.id)?;
        }
        Ok(())
    }

    /// Create or update a node, keeping its local UI state, then cascade its
    /// visibility to connected edges
    fn upsert_node(&self, scene: &dyn SceneGraph, record: &NodeRecord) -> SyncResult<()> {
        let archived = record.attributes.is_archived;

        match scene.get_node(&record.id) {
            None => {
                scene.add_node(SceneNode {
                    id: record.id.clone(),
                    position: record.position(),
                    size: self.ctx.config.default_node_size(),
                    shape: self.ctx.config.node_shape.clone(),
                    data: NodeData {
                        attributes: record.attributes.clone(),
                        ui: LocalUiState::default(),
                    },
                    visible: !archived,
                })?;
            }
            Some(existing) => {
                let ui = existing.data.ui;
                if existing.position != record.position() {
                    scene.set_position(&record.id, record.position())?;
                }
                scene.set_node_data(
                    &record.id,
                    NodeData {
                        attributes: record.attributes.clone(),
                        ui,
                    },
                )?;
            }
        }

        cascade_node_visibility(scene, &record.id, archived)
    }

    /// Add stored edges that were waiting for `node_id` to appear
    fn attach_pending_edges(
        &self,
        scene: &dyn SceneGraph,
        document: &dyn SharedDocument,
        node_id: &str,
    ) -> SyncResult<()> {
        let mode = self.ctx.current_layout_mode(document);

        for (key, value) in document.entries(MapName::Edges) {
            if scene.get_edge(&key).is_some() {
                continue;
            }
            let record = match EdgeRecord::from_value(&key, &value) {
                Ok(record) => record,
                Err(_) => continue,
            };
            if record.source_id == node_id || record.target_id == node_id {
                self.upsert_edge(scene, &record, mode)?;
            }
        }
        Ok(())
    }

    fn apply_edge_change(
        &self,
        scene: &dyn SceneGraph,
        document: &dyn SharedDocument,
        change: &KeyChange,
    ) -> SyncResult<()> {
        if change.action == ChangeAction::Delete {
            if scene.get_edge(&change.key).is_some() {
                scene.remove_cell(&change.key);
            } else {
                debug!(edge_id = %change.key, "Removed edge already absent");
            }
            return Ok(());
        }

        let value = document
            .get(MapName::Edges, &change.key)
            .ok_or_else(|| missing("edge", &change.key))?;
        let record = EdgeRecord::from_value(&change.key, &value)?;
        self.upsert_edge(scene, &record, self.ctx.current_layout_mode(document))
    }

    /// Create an edge or update it in place. Edges whose endpoints are not in
    /// the scene yet are left for [`Self::attach_pending_edges`]; an existing
    /// scene edge re-pointed at a missing node is removed until that node
    /// arrives.
    fn upsert_edge(
        &self,
        scene: &dyn SceneGraph,
        record: &EdgeRecord,
        mode: Option<LayoutMode>,
    ) -> SyncResult<()> {
        let endpoints_present = scene.get_node(&record.source_id).is_some()
            && scene.get_node(&record.target_id).is_some();
        let existing = scene.get_edge(&record.id);

        if !endpoints_present {
            if existing.is_some() {
                scene.remove_cell(&record.id);
                debug!(edge_id = %record.id, "Edge re-pointed at a missing node, detaching until it arrives");
            } else {
                debug!(edge_id = %record.id, "Edge endpoints not present yet, deferring");
            }
            return Ok(());
        }

        let style = resolve_edge_style(&record.normalized_metadata(), mode);
        let data = EdgeData::from_record(record);

        match existing {
            None => {
                scene.add_edge(SceneEdge {
                    id: record.id.clone(),
                    source: record.source_id.clone(),
                    target: record.target_id.clone(),
                    data,
                    style,
                    visible: true,
                })?;
            }
            Some(existing) => {
                if existing.source != record.source_id || existing.target != record.target_id {
                    scene.set_edge_terminals(&record.id, &record.source_id, &record.target_id)?;
                }
                if existing.data != data {
                    scene.set_edge_data(&record.id, data)?;
                }
                if existing.style != style {
                    scene.set_edge_style(&record.id, style)?;
                }
            }
        }

        reconcile_edge_visibility(scene, &record.id, &record.source_id, &record.target_id)
    }

    /// Returns the new mode when a peer changed `layoutMode`
    fn apply_meta_change(
        &self,
        scene: &dyn SceneGraph,
        document: &dyn SharedDocument,
        change: &KeyChange,
    ) -> SyncResult<Option<LayoutMode>> {
        if change.key != META_LAYOUT_MODE || change.action == ChangeAction::Delete {
            return Ok(None);
        }

        let value = document
            .get(MapName::Meta, &change.key)
            .ok_or_else(|| missing("meta", &change.key))?;
        let Some(mode) = decode_layout_mode(&value) else {
            warn!(value = %value, "Ignoring unknown layout mode");
            return Ok(None);
        };

        self.layout.restyle_edges(scene, Some(mode));
        Ok(Some(mode))
    }

    fn report<T>(&self, map: MapName, change: &KeyChange, result: SyncResult<T>) {
        match result {
            Ok(_) => {
                debug!(map = %map, key = %change.key, action = ?change.action, "Applied remote change");
                SyncMetrics::record_remote_apply(map.as_str(), &change.key, action_name(change.action));
            }
            Err(err) => self.report_skip(map, &change.key, &err),
        }
    }

    fn report_load(&self, map: MapName, key: &str, result: SyncResult<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                self.report_skip(map, key, &err);
                false
            }
        }
    }

    fn report_skip(&self, map: MapName, key: &str, err: &SyncError) {
        if err.is_entity_scoped() {
            warn!(map = %map, key = %key, error = %err, "Skipping remote change");
        } else {
            warn!(map = %map, key = %key, error = %err, "Failed to apply remote change");
        }
        SyncMetrics::record_entity_skipped(map.as_str(), key, &err.to_string());
    }
}

/// Archived nodes are hidden along with their edges. Restored nodes are shown
/// and each connected edge becomes visible only if both endpoints are.
fn cascade_node_visibility(scene: &dyn SceneGraph, node_id: &str, archived: bool) -> SyncResult<()> {
    if archived {
        scene.hide(node_id)?;
        for edge in scene.connected_edges(node_id) {
            scene.hide(&edge.id)?;
        }
    } else {
        scene.show(node_id)?;
        for edge in scene.connected_edges(node_id) {
            reconcile_edge_visibility(scene, &edge.id, &edge.source, &edge.target)?;
        }
    }
    Ok(())
}

fn reconcile_edge_visibility(
    scene: &dyn SceneGraph,
    edge_id: &str,
    source: &str,
    target: &str,
) -> SyncResult<()> {
    let visible = scene.is_visible(source) && scene.is_visible(target);
    if visible != scene.is_visible(edge_id) {
        if visible {
            scene.show(edge_id)?;
        } else {
            scene.hide(edge_id)?;
        }
    }
    Ok(())
}

fn missing(kind: &'static str, id: &str) -> SyncError {
    SyncError::MissingEntity {
        kind,
        id: id.to_string(),
    }
}

fn action_name(action: ChangeAction) -> &'static str {
    match action {
        ChangeAction::Add => "add",
        ChangeAction::Update => "update",
        ChangeAction::Delete => "delete",
    }
}
