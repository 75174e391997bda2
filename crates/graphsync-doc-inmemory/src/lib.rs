//! In-memory replicated document for GraphSync
//!
//! This crate provides [`InMemoryDocument`], an implementation of the
//! `SharedDocument` interface from graphsync-core. Every key of the `nodes`,
//! `edges` and `meta` maps is a last-writer-wins register ordered by a
//! Lamport stamp, so replicas that exchange updates converge regardless of
//! delivery order. It backs tests, demos and single-process fan-out.

use thiserror::Error;

pub mod document;
pub use document::{InMemoryDocument, UpdateHook, UpdateHookId};

pub mod update;
pub use update::{DocumentUpdate, Stamp, UpdateEntry};

use graphsync_core::SyncError;

/// Errors raised while merging encoded updates
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// The update bytes are not a valid encoded update
    #[error("Failed to decode update: {0}")]
    Decode(String),

    /// An update could not be encoded
    #[error("Failed to encode update: {0}")]
    Encode(String),

    /// The update references a map this document does not have
    #[error("Unknown map in update: {0}")]
    UnknownMap(String),
}

impl From<DocumentError> for SyncError {
    fn from(err: DocumentError) -> Self {
        SyncError::Document(err.to_string())
    }
}

/// Exchange full state between two replicas in both directions
pub fn sync_documents(
    a: &InMemoryDocument,
    b: &InMemoryDocument,
) -> Result<(), DocumentError> {
    let from_a = a.encode_state_as_update()?;
    let from_b = b.encode_state_as_update()?;
    b.apply_update(&from_a, None)?;
    a.apply_update(&from_b, None)?;
    Ok(())
}
