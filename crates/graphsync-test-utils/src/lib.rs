//! Testing utilities for GraphSync.
//!
//! This crate provides an in-memory scene graph, mocks of the host-provided
//! seams, record builders and assertion helpers.

pub mod assertions;
pub mod builders;
pub mod implementations;
pub mod mocks;
pub mod util;

/// Re-export commonly used types for convenience
pub use mockall;

pub use builders::{EdgeRecordBuilder, NodeRecordBuilder, SceneNodeBuilder};
pub use implementations::{InMemorySceneGraph, SceneCall, SceneSnapshot};
pub use mocks::{MockAwarenessChannel, MockSceneGraph};
pub use util::init_test_logging;
