use chrono::{DateTime, Utc};
use serde_json::Value;

use graphsync_core::{
    EdgeMetadata, EdgeRecord, NodeAttributes, NodeRecord, Position, RelationalSubtype,
    SemanticType, StructuralType,
};

/// Builder for replicated node records
#[derive(Debug, Clone)]
pub struct NodeRecordBuilder {
    id: String,
    position: Position,
    attributes: NodeAttributes,
}

impl NodeRecordBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            attributes: NodeAttributes::labeled(id.clone()),
            id,
            position: Position::default(),
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.attributes.label = label.into();
        self
    }

    pub fn structural(mut self, structural_type: StructuralType) -> Self {
        self.attributes.structural_type = structural_type;
        self
    }

    pub fn semantic(mut self, semantic_type: SemanticType) -> Self {
        self.attributes.semantic_type = semantic_type;
        self
    }

    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.attributes.parent_id = Some(parent_id.into());
        self
    }

    pub fn props(mut self, props: Value) -> Self {
        self.attributes.props = Some(props);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.attributes.tags.push(tag.into());
        self
    }

    pub fn archived_at(mut self, at: DateTime<Utc>) -> Self {
        self.attributes.set_archived(true, at);
        self
    }

    pub fn archived(self) -> Self {
        self.archived_at(Utc::now())
    }

    pub fn build(self) -> NodeRecord {
        NodeRecord::new(self.id, self.position, self.attributes)
    }

    /// Stored form of the record
    pub fn build_value(self) -> Value {
        match self.build().to_value() {
            Ok(value) => value,
            Err(err) => panic!("node record failed to encode: {err}"),
        }
    }
}

/// Builder for replicated edge records
#[derive(Debug, Clone)]
pub struct EdgeRecordBuilder {
    record: EdgeRecord,
}

impl EdgeRecordBuilder {
    pub fn structural(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            record: EdgeRecord::new(id, source, target, EdgeMetadata::structural()),
        }
    }

    pub fn relational(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        subtype: RelationalSubtype,
    ) -> Self {
        Self {
            record: EdgeRecord::new(id, source, target, EdgeMetadata::relational(subtype)),
        }
    }

    /// Drop metadata so only the legacy type tag describes the edge
    pub fn legacy(mut self, legacy_type: impl Into<String>) -> Self {
        self.record.metadata = None;
        self.record.legacy_type = Some(legacy_type.into());
        self
    }

    pub fn build(self) -> EdgeRecord {
        self.record
    }

    pub fn build_value(self) -> Value {
        match self.record.to_value() {
            Ok(value) => value,
            Err(err) => panic!("edge record failed to encode: {err}"),
        }
    }
}
