use graphsync_core::domain::edge_style::EdgeStyle;
use graphsync_core::{
    Cell, EdgeData, ListenerId, NodeData, Position, SceneEdge, SceneGraph, SceneGraphError,
    SceneListener, SceneNode,
};
use mockall::mock;

// Mock implementation of the SceneGraph trait
mock! {
    pub SceneGraph {}

    impl SceneGraph for SceneGraph {
        fn add_node(&self, node: SceneNode) -> Result<(), SceneGraphError>;
        fn add_edge(&self, edge: SceneEdge) -> Result<(), SceneGraphError>;
        fn remove_cell(&self, id: &str) -> bool;
        fn get_cell_by_id(&self, id: &str) -> Option<Cell>;
        fn nodes(&self) -> Vec<SceneNode>;
        fn edges(&self) -> Vec<SceneEdge>;
        fn set_position(&self, id: &str, position: Position) -> Result<(), SceneGraphError>;
        fn set_node_data(&self, id: &str, data: NodeData) -> Result<(), SceneGraphError>;
        fn set_edge_data(&self, id: &str, data: EdgeData) -> Result<(), SceneGraphError>;
        fn set_edge_style(&self, id: &str, style: EdgeStyle) -> Result<(), SceneGraphError>;
        fn set_edge_terminals(&self, id: &str, source: &str, target: &str) -> Result<(), SceneGraphError>;
        fn show(&self, id: &str) -> Result<(), SceneGraphError>;
        fn hide(&self, id: &str) -> Result<(), SceneGraphError>;
        fn is_visible(&self, id: &str) -> bool;
        fn connected_edges(&self, node_id: &str) -> Vec<SceneEdge>;
        fn subscribe(&self, listener: SceneListener) -> ListenerId;
        fn unsubscribe(&self, id: ListenerId);
    }
}
