//! Scene graph events to document writes.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use graphsync_monitoring::SyncMetrics;

use super::context::SyncContext;
use crate::domain::document::{MapName, LOCAL_ORIGIN};
use crate::domain::scene::{SceneEdge, SceneEvent, SceneNode};
use crate::error::{SyncError, SyncResult};

/// Commits one full-record snapshot per local scene mutation, tagged with
/// [`LOCAL_ORIGIN`]
pub struct LocalChangeTranslator {
    ctx: Arc<SyncContext>,
}

impl LocalChangeTranslator {
    pub(crate) fn new(ctx: Arc<SyncContext>) -> Self {
        Self { ctx }
    }

    /// Translate one scene event. Errors are logged, never returned, so a bad
    /// event cannot break the emitter's listener loop.
    pub fn handle_event(&self, event: &SceneEvent) {
        if self.ctx.guard.is_applying_remote() {
            trace!(?event, "Ignoring scene event raised by remote apply");
            return;
        }

        let result = match event {
            SceneEvent::NodeAdded { node } | SceneEvent::NodeDataChanged { node } => {
                self.commit_node(node)
            }
            SceneEvent::NodeMoved { node } => self.commit_position(node),
            SceneEvent::NodePositionChanging { node } => {
                if self.ctx.config.sync_on_continuous_move {
                    self.commit_position(node)
                } else {
                    Ok(())
                }
            }
            SceneEvent::NodeRemoved { id } => self.delete_key(MapName::Nodes, id),
            SceneEvent::EdgeAdded { edge } => self.commit_edge(edge),
            SceneEvent::EdgeRemoved { id } => self.delete_key(MapName::Edges, id),
            SceneEvent::EdgeDataChanged { edge_id } => {
                if self.ctx.config.defer_edge_data_commits {
                    self.ctx.defer_edge(edge_id);
                    Ok(())
                } else {
                    self.commit_edge_by_id(edge_id)
                }
            }
            SceneEvent::CellRemoved { id } => self.delete_cell(id),
        };

        if let Err(err) = result {
            warn!(error = %err, ?event, "Failed to commit local scene change");
        }
    }

    /// Commit a full snapshot of `node`
    pub fn commit_node(&self, node: &SceneNode) -> SyncResult<()> {
        if !node.position.is_finite() {
            warn!(node_id = %node.id, position = ?node.position, "Node position is not finite, skipping commit");
            return Ok(());
        }
        let document = self.ctx.document()?;
        let value = node.to_record().to_value()?;

        document.transact(Some(LOCAL_ORIGIN), &mut |txn| {
            txn.set(MapName::Nodes, &node.id, value.clone());
            Ok(())
        })?;

        debug!(node_id = %node.id, "Committed node snapshot");
        SyncMetrics::record_local_commit(MapName::Nodes.as_str(), &node.id, "upsert");
        Ok(())
    }

    /// Rewrite the coordinates and structural type of the stored record.
    /// Nodes without a stored record are skipped.
    pub fn commit_position(&self, node: &SceneNode) -> SyncResult<()> {
        if !node.position.is_finite() {
            warn!(node_id = %node.id, position = ?node.position, "Node position is not finite, skipping commit");
            return Ok(());
        }
        let document = self.ctx.document()?;
        let structural_type = serde_json::to_value(node.data.attributes.structural_type)?;
        let mut committed = false;

        document.transact(Some(LOCAL_ORIGIN), &mut |txn| {
            let Some(mut record) = txn.get(MapName::Nodes, &node.id) else {
                return Ok(());
            };
            let fields = record.as_object_mut().ok_or_else(|| SyncError::MalformedRecord {
                map: MapName::Nodes.to_string(),
                key: node.id.clone(),
                reason: "record is not an object".to_string(),
            })?;
            fields.insert("x".to_string(), Value::from(node.position.x));
            fields.insert("y".to_string(), Value::from(node.position.y));
            fields.insert("structuralType".to_string(), structural_type.clone());
            txn.set(MapName::Nodes, &node.id, record);
            committed = true;
            Ok(())
        })?;

        if committed {
            SyncMetrics::record_local_commit(MapName::Nodes.as_str(), &node.id, "position");
        } else {
            debug!(node_id = %node.id, "No stored record for moved node, skipping");
        }
        Ok(())
    }

    /// Commit a full snapshot of `edge`; edges missing an endpoint are skipped
    pub fn commit_edge(&self, edge: &SceneEdge) -> SyncResult<()> {
        if !edge.has_endpoints() {
            debug!(edge_id = %edge.id, "Edge has no source or target, skipping");
            return Ok(());
        }

        let document = self.ctx.document()?;
        let value = edge.to_record().to_value()?;

        document.transact(Some(LOCAL_ORIGIN), &mut |txn| {
            txn.set(MapName::Edges, &edge.id, value.clone());
            Ok(())
        })?;

        debug!(edge_id = %edge.id, "Committed edge snapshot");
        SyncMetrics::record_local_commit(MapName::Edges.as_str(), &edge.id, "upsert");
        Ok(())
    }

    /// Re-read an edge from the scene graph and commit it
    pub fn commit_edge_by_id(&self, edge_id: &str) -> SyncResult<()> {
        let edge = self
            .ctx
            .scene()?
            .get_edge(edge_id)
            .ok_or_else(|| SyncError::MissingEntity {
                kind: "edge",
                id: edge_id.to_string(),
            })?;
        self.commit_edge(&edge)
    }

    /// Commit every queued edge-data change. Returns the number committed.
    pub fn flush_deferred(&self) -> usize {
        let mut committed = 0;
        for edge_id in self.ctx.take_deferred_edges() {
            match self.commit_edge_by_id(&edge_id) {
                Ok(()) => committed += 1,
                Err(err) => warn!(edge_id = %edge_id, error = %err, "Deferred edge commit failed"),
            }
        }
        committed
    }

    /// Republish every scene node in one transaction
    pub fn sync_all_nodes(&self) -> SyncResult<usize> {
        let scene = self.ctx.scene()?;
        let document = self.ctx.document()?;

        let records = scene
            .nodes()
            .iter()
            .map(|node| Ok((node.id.clone(), node.to_record().to_value()?)))
            .collect::<SyncResult<Vec<(String, Value)>>>()?;

        document.transact(Some(LOCAL_ORIGIN), &mut |txn| {
            for (id, value) in &records {
                txn.set(MapName::Nodes, id, value.clone());
            }
            Ok(())
        })?;

        SyncMetrics::record_bulk_sync(records.len());
        Ok(records.len())
    }

    fn delete_key(&self, map: MapName, key: &str) -> SyncResult<()> {
        let document = self.ctx.document()?;
        let mut removed = false;

        document.transact(Some(LOCAL_ORIGIN), &mut |txn| {
            removed = txn.delete(map, key);
            Ok(())
        })?;

        if removed {
            SyncMetrics::record_local_commit(map.as_str(), key, "delete");
        }
        Ok(())
    }

    fn delete_cell(&self, id: &str) -> SyncResult<()> {
        let document = self.ctx.document()?;
        let mut removed_from = None;

        document.transact(Some(LOCAL_ORIGIN), &mut |txn| {
            removed_from = if txn.delete(MapName::Nodes, id) {
                Some(MapName::Nodes)
            } else if txn.delete(MapName::Edges, id) {
                Some(MapName::Edges)
            } else {
                None
            };
            Ok(())
        })?;

        if let Some(map) = removed_from {
            SyncMetrics::record_local_commit(map.as_str(), id, "delete");
        }
        Ok(())
    }
}
