//! An in-memory scene graph that behaves like a canvas graph model.
//!
//! Mutators emit the same events a canvas would, after the mutation is
//! applied and with the internal lock released. Every successful mutator call
//! is recorded so tests can assert exactly what the engine did.

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

use graphsync_core::domain::edge_style::EdgeStyle;
use graphsync_core::{
    Cell, EdgeData, ListenerId, NodeData, Position, SceneEdge, SceneEvent, SceneGraph,
    SceneGraphError, SceneListener, SceneNode,
};

/// One recorded mutator call, by cell id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneCall {
    AddNode(String),
    AddEdge(String),
    RemoveCell(String),
    SetPosition(String),
    SetNodeData(String),
    SetEdgeData(String),
    SetEdgeStyle(String),
    SetEdgeTerminals(String),
    Show(String),
    Hide(String),
}

impl SceneCall {
    pub fn is_add_node(&self) -> bool {
        matches!(self, SceneCall::AddNode(_))
    }
}

/// Comparable view of a scene: ids, positions, labels and visibility
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub id: String,
    pub position: Position,
    pub label: String,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSnapshot {
    pub id: String,
    pub source: String,
    pub target: String,
    pub visible: bool,
}

#[derive(Default)]
struct SceneState {
    nodes: BTreeMap<String, SceneNode>,
    edges: BTreeMap<String, SceneEdge>,
}

impl SceneState {
    fn connected(&self, node_id: &str) -> Vec<SceneEdge> {
        self.edges
            .values()
            .filter(|edge| edge.source == node_id || edge.target == node_id)
            .cloned()
            .collect()
    }
}

#[derive(Default)]
pub struct InMemorySceneGraph {
    state: Mutex<SceneState>,
    listeners: RwLock<Vec<(ListenerId, SceneListener)>>,
    calls: Mutex<Vec<SceneCall>>,
    next_listener: AtomicU64,
}

impl InMemorySceneGraph {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every successful mutator call so far
    pub fn calls(&self) -> Vec<SceneCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn count_calls(&self, predicate: impl Fn(&SceneCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver an event to listeners without mutating anything
    pub fn emit(&self, event: SceneEvent) {
        let listeners: Vec<SceneListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        trace!(?event, listeners = listeners.len(), "Emitting scene event");
        for listener in listeners {
            listener(&event);
        }
    }

    /// A user drag: position changes, then the end-of-drag event
    pub fn move_node(&self, id: &str, position: Position) -> Result<(), SceneGraphError> {
        self.set_position(id, position)?;
        let node = self.get_node(id).ok_or_else(|| SceneGraphError::NotFound(id.to_string()))?;
        self.emit(SceneEvent::NodeMoved { node });
        Ok(())
    }

    /// A user edit of a node's data
    pub fn update_node_data(
        &self,
        id: &str,
        edit: impl FnOnce(&mut NodeData),
    ) -> Result<(), SceneGraphError> {
        let mut data = self
            .get_node(id)
            .ok_or_else(|| SceneGraphError::NotFound(id.to_string()))?
            .data;
        edit(&mut data);
        self.set_node_data(id, data)
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        let state = self.state.lock();
        SceneSnapshot {
            nodes: state
                .nodes
                .values()
                .map(|node| NodeSnapshot {
                    id: node.id.clone(),
                    position: node.position,
                    label: node.data.attributes.label.clone(),
                    visible: node.visible,
                })
                .collect(),
            edges: state
                .edges
                .values()
                .map(|edge| EdgeSnapshot {
                    id: edge.id.clone(),
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    visible: edge.visible,
                })
                .collect(),
        }
    }

    fn record(&self, call: SceneCall) {
        self.calls.lock().push(call);
    }

    fn with_node<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut SceneNode) -> T,
    ) -> Result<T, SceneGraphError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state.nodes.get_mut(id) {
            Some(node) => Ok(f(node)),
            None if state.edges.contains_key(id) => Err(SceneGraphError::WrongKind {
                id: id.to_string(),
                expected: "node",
            }),
            None => Err(SceneGraphError::NotFound(id.to_string())),
        }
    }

    fn with_edge<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut SceneEdge) -> T,
    ) -> Result<T, SceneGraphError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state.edges.get_mut(id) {
            Some(edge) => Ok(f(edge)),
            None if state.nodes.contains_key(id) => Err(SceneGraphError::WrongKind {
                id: id.to_string(),
                expected: "edge",
            }),
            None => Err(SceneGraphError::NotFound(id.to_string())),
        }
    }

    fn set_visible(&self, id: &str, visible: bool) -> Result<(), SceneGraphError> {
        let mut state = self.state.lock();
        if let Some(node) = state.nodes.get_mut(id) {
            node.visible = visible;
        } else if let Some(edge) = state.edges.get_mut(id) {
            edge.visible = visible;
        } else {
            return Err(SceneGraphError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

impl SceneGraph for InMemorySceneGraph {
    fn add_node(&self, node: SceneNode) -> Result<(), SceneGraphError> {
        {
            let mut state = self.state.lock();
            if state.nodes.contains_key(&node.id) || state.edges.contains_key(&node.id) {
                return Err(SceneGraphError::Duplicate(node.id));
            }
            state.nodes.insert(node.id.clone(), node.clone());
        }
        self.record(SceneCall::AddNode(node.id.clone()));
        self.emit(SceneEvent::NodeAdded { node });
        Ok(())
    }

    fn add_edge(&self, edge: SceneEdge) -> Result<(), SceneGraphError> {
        {
            let mut state = self.state.lock();
            if state.nodes.contains_key(&edge.id) || state.edges.contains_key(&edge.id) {
                return Err(SceneGraphError::Duplicate(edge.id));
            }
            for endpoint in [&edge.source, &edge.target] {
                if !state.nodes.contains_key(endpoint.as_str()) {
                    return Err(SceneGraphError::NotFound(endpoint.clone()));
                }
            }
            state.edges.insert(edge.id.clone(), edge.clone());
        }
        self.record(SceneCall::AddEdge(edge.id.clone()));
        self.emit(SceneEvent::EdgeAdded { edge });
        Ok(())
    }

    fn remove_cell(&self, id: &str) -> bool {
        let (removed_edges, removed_node) = {
            let mut state = self.state.lock();
            if state.edges.remove(id).is_some() {
                (vec![id.to_string()], false)
            } else if state.nodes.remove(id).is_some() {
                let connected: Vec<String> =
                    state.connected(id).into_iter().map(|edge| edge.id).collect();
                for edge_id in &connected {
                    state.edges.remove(edge_id);
                }
                (connected, true)
            } else {
                return false;
            }
        };

        self.record(SceneCall::RemoveCell(id.to_string()));
        for edge_id in removed_edges {
            self.emit(SceneEvent::EdgeRemoved { id: edge_id });
        }
        if removed_node {
            self.emit(SceneEvent::NodeRemoved { id: id.to_string() });
        }
        true
    }

    fn get_cell_by_id(&self, id: &str) -> Option<Cell> {
        let state = self.state.lock();
        state
            .nodes
            .get(id)
            .cloned()
            .map(Cell::Node)
            .or_else(|| state.edges.get(id).cloned().map(Cell::Edge))
    }

    fn nodes(&self) -> Vec<SceneNode> {
        self.state.lock().nodes.values().cloned().collect()
    }

    fn edges(&self) -> Vec<SceneEdge> {
        self.state.lock().edges.values().cloned().collect()
    }

    fn set_position(&self, id: &str, position: Position) -> Result<(), SceneGraphError> {
        let node = self.with_node(id, |node| {
            node.position = position;
            node.clone()
        })?;
        self.record(SceneCall::SetPosition(id.to_string()));
        self.emit(SceneEvent::NodePositionChanging { node });
        Ok(())
    }

    fn set_node_data(&self, id: &str, data: NodeData) -> Result<(), SceneGraphError> {
        let node = self.with_node(id, |node| {
            node.data = data;
            node.clone()
        })?;
        self.record(SceneCall::SetNodeData(id.to_string()));
        self.emit(SceneEvent::NodeDataChanged { node });
        Ok(())
    }

    fn set_edge_data(&self, id: &str, data: EdgeData) -> Result<(), SceneGraphError> {
        self.with_edge(id, |edge| edge.data = data)?;
        self.record(SceneCall::SetEdgeData(id.to_string()));
        self.emit(SceneEvent::EdgeDataChanged {
            edge_id: id.to_string(),
        });
        Ok(())
    }

    fn set_edge_style(&self, id: &str, style: EdgeStyle) -> Result<(), SceneGraphError> {
        self.with_edge(id, |edge| edge.style = style)?;
        self.record(SceneCall::SetEdgeStyle(id.to_string()));
        Ok(())
    }

    fn set_edge_terminals(
        &self,
        id: &str,
        source: &str,
        target: &str,
    ) -> Result<(), SceneGraphError> {
        {
            let mut state = self.state.lock();
            for endpoint in [source, target] {
                if !state.nodes.contains_key(endpoint) {
                    return Err(SceneGraphError::NotFound(endpoint.to_string()));
                }
            }
            let edge = state
                .edges
                .get_mut(id)
                .ok_or_else(|| SceneGraphError::NotFound(id.to_string()))?;
            edge.source = source.to_string();
            edge.target = target.to_string();
        }
        self.record(SceneCall::SetEdgeTerminals(id.to_string()));
        self.emit(SceneEvent::EdgeDataChanged {
            edge_id: id.to_string(),
        });
        Ok(())
    }

    fn show(&self, id: &str) -> Result<(), SceneGraphError> {
        self.set_visible(id, true)?;
        self.record(SceneCall::Show(id.to_string()));
        Ok(())
    }

    fn hide(&self, id: &str) -> Result<(), SceneGraphError> {
        self.set_visible(id, false)?;
        self.record(SceneCall::Hide(id.to_string()));
        Ok(())
    }

    fn is_visible(&self, id: &str) -> bool {
        let state = self.state.lock();
        state
            .nodes
            .get(id)
            .map(|node| node.visible)
            .or_else(|| state.edges.get(id).map(|edge| edge.visible))
            .unwrap_or(false)
    }

    fn connected_edges(&self, node_id: &str) -> Vec<SceneEdge> {
        self.state.lock().connected(node_id)
    }

    fn subscribe(&self, listener: SceneListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.listeners.write().retain(|(listener_id, _)| *listener_id != id);
    }
}
