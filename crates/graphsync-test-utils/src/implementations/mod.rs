//! In-memory stand-ins for host-provided seams

pub mod in_memory_scene_graph;

pub use in_memory_scene_graph::*;
