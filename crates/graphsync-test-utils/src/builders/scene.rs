use graphsync_core::domain::edge_style::resolve_edge_style;
use graphsync_core::{
    EdgeData, EdgeMetadata, LocalUiState, NodeAttributes, NodeData, Position, RelationalSubtype,
    SceneEdge, SceneNode, Size, StructuralType, SyncConfig,
};

/// Builder for scene nodes, sized and shaped like the engine's defaults
#[derive(Debug, Clone)]
pub struct SceneNodeBuilder {
    node: SceneNode,
}

impl SceneNodeBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let config = SyncConfig::default();
        Self {
            node: SceneNode {
                position: Position::default(),
                size: Size::new(config.default_node_width, config.default_node_height),
                shape: config.node_shape,
                data: NodeData {
                    attributes: NodeAttributes::labeled(id.clone()),
                    ui: LocalUiState::default(),
                },
                visible: true,
                id,
            },
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.node.position = Position::new(x, y);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.node.data.attributes.label = label.into();
        self
    }

    pub fn structural(mut self, structural_type: StructuralType) -> Self {
        self.node.data.attributes.structural_type = structural_type;
        self
    }

    pub fn ui(mut self, ui: LocalUiState) -> Self {
        self.node.data.ui = ui;
        self
    }

    pub fn build(self) -> SceneNode {
        self.node
    }
}

/// A visible scene edge styled for the default layout
pub fn scene_edge(
    id: impl Into<String>,
    source: impl Into<String>,
    target: impl Into<String>,
    metadata: EdgeMetadata,
) -> SceneEdge {
    SceneEdge {
        id: id.into(),
        source: source.into(),
        target: target.into(),
        data: EdgeData {
            legacy_type: None,
            metadata: Some(metadata),
        },
        style: resolve_edge_style(&metadata, None),
        visible: true,
    }
}

pub fn structural_edge(
    id: impl Into<String>,
    source: impl Into<String>,
    target: impl Into<String>,
) -> SceneEdge {
    scene_edge(id, source, target, EdgeMetadata::structural())
}

pub fn relational_edge(
    id: impl Into<String>,
    source: impl Into<String>,
    target: impl Into<String>,
    subtype: RelationalSubtype,
) -> SceneEdge {
    scene_edge(id, source, target, EdgeMetadata::relational(subtype))
}
