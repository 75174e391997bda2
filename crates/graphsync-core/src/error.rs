use thiserror::Error;

/// Core error type for the sync engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The engine has no scene graph / document attached
    #[error("Sync engine is not initialized")]
    NotInitialized,

    /// A referenced entity is absent from the scene graph or the document
    #[error("{kind} not found: {id}")]
    MissingEntity {
        /// Entity kind ("node", "edge", "cell")
        kind: &'static str,
        /// Entity identifier
        id: String,
    },

    /// A replicated record could not be decoded
    #[error("Malformed record {map}/{key}: {reason}")]
    MalformedRecord {
        /// Replicated map holding the record
        map: String,
        /// Record key
        key: String,
        /// Decoder message
        reason: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Replicated document error
    #[error("Document error: {0}")]
    Document(String),

    /// Scene graph error
    #[error("Scene graph error: {0}")]
    SceneGraph(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result alias used across the engine
pub type SyncResult<T> = Result<T, SyncError>;

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<crate::domain::scene::SceneGraphError> for SyncError {
    fn from(err: crate::domain::scene::SceneGraphError) -> Self {
        match err {
            crate::domain::scene::SceneGraphError::NotFound(id) => {
                SyncError::MissingEntity { kind: "cell", id }
            }
            other => SyncError::SceneGraph(other.to_string()),
        }
    }
}

impl SyncError {
    /// Whether the error only concerns one entity and the batch may continue
    pub fn is_entity_scoped(&self) -> bool {
        matches!(
            self,
            SyncError::MissingEntity { .. } | SyncError::MalformedRecord { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scene::SceneGraphError;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (SyncError::NotInitialized, "Sync engine is not initialized"),
            (
                SyncError::MissingEntity { kind: "node", id: "n1".to_string() },
                "node not found: n1",
            ),
            (
                SyncError::MalformedRecord {
                    map: "edges".to_string(),
                    key: "e1".to_string(),
                    reason: "missing field `id`".to_string(),
                },
                "Malformed record edges/e1: missing field `id`",
            ),
            (SyncError::Document("closed".to_string()), "Document error: closed"),
            (SyncError::Configuration("bad".to_string()), "Configuration error: bad"),
        ];

        for (error, expected_msg) in errors {
            assert_eq!(error.to_string(), expected_msg);
        }
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error: SyncError = json_error.into();

        match error {
            SyncError::Serialization(msg) => assert!(msg.contains("expected value")),
            _ => panic!("Expected Serialization variant"),
        }
    }

    #[test]
    fn test_scene_not_found_maps_to_missing_entity() {
        let error: SyncError = SceneGraphError::NotFound("n9".to_string()).into();
        assert!(error.is_entity_scoped());
        assert_eq!(error, SyncError::MissingEntity { kind: "cell", id: "n9".to_string() });
    }
}
