pub mod awareness;
pub mod scene_graph;

pub use awareness::*;
pub use scene_graph::*;
