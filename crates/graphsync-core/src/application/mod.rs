//! The sync engine: translator, applier, layout channel and the manager that
//! wires them to a scene graph and a document.

mod context;
pub mod layout_channel;
pub mod local_translator;
pub mod origin_guard;
pub mod remote_applier;
pub mod sync_manager;

pub use context::LayoutModeCallback;
pub use layout_channel::LayoutModeChannel;
pub use local_translator::LocalChangeTranslator;
pub use origin_guard::{OriginGuard, RemoteApplyScope};
pub use remote_applier::{LoadSummary, RemoteChangeApplier};
pub use sync_manager::GraphSyncManager;
