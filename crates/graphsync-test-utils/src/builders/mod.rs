pub mod records;
pub mod scene;

pub use records::*;
pub use scene::*;
