use graphsync_core::{NodeRecord, SceneGraph};
use thiserror::Error;

/// Error type for scene validation failures
#[derive(Debug, Error, PartialEq)]
pub enum SceneValidationError {
    #[error("Node missing from scene: {0}")]
    MissingNode(String),

    #[error("Node {id} field {field} mismatch: expected {expected}, got {actual}")]
    NodeMismatch {
        id: String,
        field: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Node {id} visibility is {actual}, archived flag says {expected}")]
    NodeVisibility {
        id: String,
        expected: bool,
        actual: bool,
    },

    #[error("Edge {id} visibility is {actual}, endpoints say {expected}")]
    EdgeVisibility {
        id: String,
        expected: bool,
        actual: bool,
    },
}

/// Asserts that the scene holds a node whose replicated state equals `record`.
pub fn assert_node_matches_record(
    scene: &dyn SceneGraph,
    record: &NodeRecord,
) -> Result<(), SceneValidationError> {
    let node = scene
        .get_node(&record.id)
        .ok_or_else(|| SceneValidationError::MissingNode(record.id.clone()))?;

    if node.position != record.position() {
        return Err(SceneValidationError::NodeMismatch {
            id: record.id.clone(),
            field: "position",
            expected: format!("{:?}", record.position()),
            actual: format!("{:?}", node.position),
        });
    }
    if node.data.attributes != record.attributes {
        return Err(SceneValidationError::NodeMismatch {
            id: record.id.clone(),
            field: "attributes",
            expected: format!("{:?}", record.attributes),
            actual: format!("{:?}", node.data.attributes),
        });
    }
    Ok(())
}

/// Asserts the visibility rules: a node is visible iff it is not archived, an
/// edge is visible iff both endpoints are visible.
pub fn assert_visibility_consistent(scene: &dyn SceneGraph) -> Result<(), SceneValidationError> {
    for node in scene.nodes() {
        let expected = !node.is_archived();
        if node.visible != expected {
            return Err(SceneValidationError::NodeVisibility {
                id: node.id,
                expected,
                actual: node.visible,
            });
        }
    }

    for edge in scene.edges() {
        let expected = scene.is_visible(&edge.source) && scene.is_visible(&edge.target);
        if edge.visible != expected {
            return Err(SceneValidationError::EdgeVisibility {
                id: edge.id,
                expected,
                actual: edge.visible,
            });
        }
    }
    Ok(())
}
