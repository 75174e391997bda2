//! Replicated record shapes stored in the shared document.
//!
//! Records are written as full snapshots (never field patches) and decoded
//! leniently: legacy field names are accepted through aliases and malformed
//! optional sub-objects decode to `None` instead of failing the whole record.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use crate::error::{SyncError, SyncResult};
use crate::types::{LayoutMode, Position};

/// Key of the layout mode entry in the `meta` map
pub const META_LAYOUT_MODE: &str = "layoutMode";
/// Key of the root node id entry in the `meta` map
pub const META_ROOT_ID: &str = "rootId";

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

/// Position of a node in the structural tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuralType {
    /// The single tree root
    Root,
    /// First-level child
    #[default]
    Topic,
    /// Deeper descendant
    Subtopic,
}

/// Business meaning of a node, selecting the shape of its typed props
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SemanticType {
    #[default]
    Ordinary,
    Task,
    Requirement,
    Pbs,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "todo")]
    Todo,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "done")]
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

/// MoSCoW priority of a requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoscowPriority {
    Must,
    Should,
    Could,
    Wont,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Document,
    Model,
    Drawing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretLevel {
    Public,
    Internal,
    Secret,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProps {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    /// ISO 8601 date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub priority: Option<TaskPriority>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementProps {
    /// e.g. "functional", "non-functional"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub priority: Option<MoscowPriority>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbsProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataProps {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub data_type: Option<DataKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub secret_level: Option<SecretLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
}

/// Typed view over a node's `props`, selected by its [`SemanticType`]
#[derive(Debug, Clone, PartialEq)]
pub enum NodeProps {
    /// No props stored
    None,
    Task(TaskProps),
    Requirement(RequirementProps),
    Pbs(PbsProps),
    Data(DataProps),
    /// Props that do not match the node's semantic type
    Other(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    #[default]
    None,
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStepStatus {
    Waiting,
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalAction {
    Submitted,
    Approved,
    Rejected,
}

/// One step of an approval pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalStep {
    pub index: u32,
    pub name: String,
    pub assignee_id: String,
    pub status: ApprovalStepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub action: ApprovalAction,
    pub actor_id: String,
    pub step_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Approval workflow state attached to a node; replicated opaquely
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalPipeline {
    pub status: ApprovalStatus,
    pub current_step_index: u32,
    #[serde(default)]
    pub steps: Vec<ApprovalStep>,
    #[serde(default)]
    pub history: Vec<ApprovalHistoryEntry>,
}

/// File attached to a node for approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deliverable {
    pub id: String,
    pub file_id: String,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Replicated node fields other than identity and position
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAttributes {
    #[serde(default)]
    pub label: String,
    #[serde(default, alias = "mindmapType", deserialize_with = "lenient_or_default")]
    pub structural_type: StructuralType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default, alias = "nodeType", deserialize_with = "lenient_or_default")]
    pub semantic_type: SemanticType,
    /// Raw props; see [`NodeAttributes::typed_props`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub approval: Option<ApprovalPipeline>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient_or_default")]
    pub deliverables: Vec<Deliverable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
}

impl NodeAttributes {
    /// Create attributes with only a label set
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Decode `props` according to the semantic type
    pub fn typed_props(&self) -> NodeProps {
        let Some(props) = &self.props else {
            return NodeProps::None;
        };

        let typed = match self.semantic_type {
            SemanticType::Task => serde_json::from_value(props.clone()).map(NodeProps::Task),
            SemanticType::Requirement => {
                serde_json::from_value(props.clone()).map(NodeProps::Requirement)
            }
            SemanticType::Pbs => serde_json::from_value(props.clone()).map(NodeProps::Pbs),
            SemanticType::Data => serde_json::from_value(props.clone()).map(NodeProps::Data),
            SemanticType::Ordinary => return NodeProps::Other(props.clone()),
        };

        typed.unwrap_or_else(|_| NodeProps::Other(props.clone()))
    }

    /// Store typed props, switching the semantic type to match
    pub fn set_typed_props(&mut self, props: NodeProps) -> SyncResult<()> {
        let (semantic_type, value) = match props {
            NodeProps::None => (self.semantic_type, None),
            NodeProps::Task(p) => (SemanticType::Task, Some(serde_json::to_value(p)?)),
            NodeProps::Requirement(p) => {
                (SemanticType::Requirement, Some(serde_json::to_value(p)?))
            }
            NodeProps::Pbs(p) => (SemanticType::Pbs, Some(serde_json::to_value(p)?)),
            NodeProps::Data(p) => (SemanticType::Data, Some(serde_json::to_value(p)?)),
            NodeProps::Other(v) => (self.semantic_type, Some(v)),
        };
        self.semantic_type = semantic_type;
        self.props = value;
        Ok(())
    }

    /// Mark the node archived (or restored) at the given instant
    pub fn set_archived(&mut self, archived: bool, at: DateTime<Utc>) {
        self.is_archived = archived;
        self.archived_at = archived.then_some(at);
    }
}

/// One graph node as stored in the `nodes` map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(flatten)]
    pub attributes: NodeAttributes,
}

impl NodeRecord {
    /// Create a record from its parts
    pub fn new(id: impl Into<String>, position: Position, attributes: NodeAttributes) -> Self {
        Self {
            id: id.into(),
            x: position.x,
            y: position.y,
            attributes,
        }
    }

    /// Canvas position of the node
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// Decode a document value stored under `key`
    pub fn from_value(key: &str, value: &Value) -> SyncResult<Self> {
        let mut record: NodeRecord = serde_json::from_value(value.clone())
            .map_err(|e| malformed("nodes", key, e))?;
        if record.id.is_empty() {
            record.id = key.to_string();
        }
        Ok(record)
    }

    /// Encode for storage
    pub fn to_value(&self) -> SyncResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Semantic class of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Parent-child tree edge; drives layout and navigation
    #[default]
    #[serde(rename = "structural", alias = "hierarchical")]
    Structural,
    /// Non-hierarchical relationship such as execution ordering
    #[serde(rename = "relational", alias = "dependency")]
    Relational,
}

/// Execution-order variant of a relational edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RelationalSubtype {
    #[default]
    #[serde(rename = "FS")]
    FinishToStart,
    #[serde(rename = "SS")]
    StartToStart,
    #[serde(rename = "FF")]
    FinishToFinish,
    #[serde(rename = "SF")]
    StartToFinish,
}

impl RelationalSubtype {
    /// Short code shown on the edge label
    pub fn code(&self) -> &'static str {
        match self {
            RelationalSubtype::FinishToStart => "FS",
            RelationalSubtype::StartToStart => "SS",
            RelationalSubtype::FinishToFinish => "FF",
            RelationalSubtype::StartToFinish => "SF",
        }
    }
}

impl fmt::Display for RelationalSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Edge classification stored in `EdgeRecord::metadata`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeMetadata {
    pub kind: EdgeKind,
    #[serde(
        default,
        alias = "dependencyType",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient"
    )]
    pub relational_subtype: Option<RelationalSubtype>,
}

impl EdgeMetadata {
    /// Metadata for a structural edge
    pub fn structural() -> Self {
        Self::default()
    }

    /// Metadata for a relational edge of the given subtype
    pub fn relational(subtype: RelationalSubtype) -> Self {
        Self {
            kind: EdgeKind::Relational,
            relational_subtype: Some(subtype),
        }
    }
}

/// Map possibly-absent metadata and a legacy type tag to the current shape.
///
/// Metadata wins when present. Without it, an absent or structural legacy tag
/// means structural and any other tag means relational. Relational edges
/// always carry a subtype, defaulting to finish-to-start.
pub fn resolve_edge_metadata(
    metadata: Option<&EdgeMetadata>,
    legacy_type: Option<&str>,
) -> EdgeMetadata {
    let kind = match (metadata, legacy_type) {
        (Some(meta), _) => meta.kind,
        (None, None) => EdgeKind::Structural,
        (None, Some(legacy)) => match legacy {
            "" | "hierarchical" | "structural" => EdgeKind::Structural,
            _ => EdgeKind::Relational,
        },
    };

    match kind {
        EdgeKind::Structural => EdgeMetadata::structural(),
        EdgeKind::Relational => EdgeMetadata::relational(
            metadata
                .and_then(|m| m.relational_subtype)
                .unwrap_or_default(),
        ),
    }
}

/// One connection as stored in the `edges` map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    pub id: String,
    #[serde(alias = "source")]
    pub source_id: String,
    #[serde(alias = "target")]
    pub target_id: String,
    /// Pre-metadata type tag ("hierarchical", "reference", ...)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub legacy_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub metadata: Option<EdgeMetadata>,
}

impl EdgeRecord {
    /// Create a record with explicit metadata
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        metadata: EdgeMetadata,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            legacy_type: None,
            metadata: Some(metadata),
        }
    }

    /// Metadata after legacy normalization
    pub fn normalized_metadata(&self) -> EdgeMetadata {
        resolve_edge_metadata(self.metadata.as_ref(), self.legacy_type.as_deref())
    }

    pub fn kind(&self) -> EdgeKind {
        self.normalized_metadata().kind
    }

    pub fn is_structural(&self) -> bool {
        self.kind() == EdgeKind::Structural
    }

    pub fn is_relational(&self) -> bool {
        self.kind() == EdgeKind::Relational
    }

    /// Decode a document value stored under `key`
    pub fn from_value(key: &str, value: &Value) -> SyncResult<Self> {
        let mut record: EdgeRecord = serde_json::from_value(value.clone())
            .map_err(|e| malformed("edges", key, e))?;
        if record.id.is_empty() {
            record.id = key.to_string();
        }
        Ok(record)
    }

    /// Encode for storage
    pub fn to_value(&self) -> SyncResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Document-wide settings held in the `meta` map, one entry per key
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetaRecord {
    pub layout_mode: Option<LayoutMode>,
    pub root_id: Option<String>,
}

impl MetaRecord {
    /// Build from the `meta` map entries, ignoring unknown keys
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a Value)>) -> Self {
        let mut meta = MetaRecord::default();
        for (key, value) in entries {
            match key {
                META_LAYOUT_MODE => meta.layout_mode = decode_layout_mode(value),
                META_ROOT_ID => meta.root_id = value.as_str().map(str::to_string),
                _ => {}
            }
        }
        meta
    }
}

/// Decode a `meta.layoutMode` value; unknown modes yield `None`
pub fn decode_layout_mode(value: &Value) -> Option<LayoutMode> {
    value.as_str().and_then(|s| s.parse().ok())
}

/// Whether adding a relational `source -> target` edge would close a cycle
/// among the existing relational edges. Structural edges are ignored.
pub fn would_create_relational_cycle<'a>(
    edges: impl IntoIterator<Item = &'a EdgeRecord>,
    source_id: &str,
    target_id: &str,
) -> bool {
    if source_id == target_id {
        return true;
    }

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges.into_iter().filter(|e| e.is_relational()) {
        adjacency
            .entry(edge.source_id.as_str())
            .or_default()
            .push(edge.target_id.as_str());
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::from([target_id]);
    while let Some(current) = queue.pop_front() {
        if current == source_id {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(next) = adjacency.get(current) {
            queue.extend(next.iter().copied());
        }
    }
    false
}

fn malformed(map: &str, key: &str, err: serde_json::Error) -> SyncError {
    SyncError::MalformedRecord {
        map: map.to_string(),
        key: key.to_string(),
        reason: err.to_string(),
    }
}
