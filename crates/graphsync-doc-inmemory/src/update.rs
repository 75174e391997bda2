//! Encoded update format exchanged between replicas.

use graphsync_core::MapName;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::DocumentError;

/// Lamport stamp of a write. Ties on `clock` are broken by `client`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Stamp {
    pub clock: u64,
    pub client: u64,
}

/// One register write; `value: None` is a deletion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEntry {
    pub map: String,
    pub key: String,
    pub value: Option<Value>,
    pub stamp: Stamp,
}

/// A batch of register writes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentUpdate {
    pub entries: Vec<UpdateEntry>,
}

impl DocumentUpdate {
    pub fn encode(&self) -> Result<Vec<u8>, DocumentError> {
        serde_json::to_vec(self).map_err(|e| DocumentError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DocumentError> {
        serde_json::from_slice(bytes).map_err(|e| DocumentError::Decode(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) fn parse_map(name: &str) -> Result<MapName, DocumentError> {
    MapName::ALL
        .into_iter()
        .find(|map| map.as_str() == name)
        .ok_or_else(|| DocumentError::UnknownMap(name.to_string()))
}
