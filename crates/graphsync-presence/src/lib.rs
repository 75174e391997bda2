//! Presence layer for GraphSync
//!
//! Publishes the local session's user, cursor and selection on an ephemeral
//! awareness channel and delivers the list of peers to the UI. Presence state
//! never goes through the replicated document.

use thiserror::Error;

pub mod awareness;
pub mod config;
pub mod manager;
pub mod throttle;
pub mod user;

pub use awareness::{
    AwarenessChange, AwarenessChannel, AwarenessHub, AwarenessListener, AwarenessState, ClientId,
    HubChannel, ListenerId,
};
pub use config::{AwarenessConfig, PresenceConfig};
pub use manager::{PeersCallback, PresenceManager, SubscriptionId};
pub use throttle::{CursorThrottle, ThrottleDecision};
pub use user::{user_color, AwarenessUser, CollabUser, Cursor, DEFAULT_PALETTE};

/// Errors raised by the presence layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PresenceError {
    /// The manager has no awareness channel
    #[error("Presence session has not joined")]
    NotJoined,

    /// The awareness channel rejected an operation
    #[error("Awareness channel error: {0}")]
    Channel(String),

    /// A state field could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PresenceError {
    fn from(err: serde_json::Error) -> Self {
        PresenceError::Serialization(err.to_string())
    }
}

/// Result alias for presence operations
pub type PresenceResult<T> = Result<T, PresenceError>;
