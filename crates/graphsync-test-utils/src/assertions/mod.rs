//! Assertion utilities for validating scene graphs against replicated state.
//!
//! Each helper returns a `Result` so tests can `?` through several checks or
//! inspect the failure.

mod scene;

pub use scene::*;
