//! Reentrancy guard between remote application and local translation.
//!
//! While a [`RemoteApplyScope`] is alive the scene graph is being mutated on
//! behalf of the document, and the local change translator ignores every scene
//! event. The scope restores the previous flag value when dropped, so the flag
//! is reset on every exit path, including early returns and panics.

use std::sync::atomic::{AtomicBool, Ordering};

pub use crate::domain::document::LOCAL_ORIGIN;

#[derive(Debug, Default)]
pub struct OriginGuard {
    applying_remote: AtomicBool,
}

impl OriginGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a remote apply is in progress
    pub fn is_applying_remote(&self) -> bool {
        self.applying_remote.load(Ordering::Acquire)
    }

    /// Mark a remote apply as in progress until the returned scope drops
    #[must_use = "the guard is released as soon as the scope is dropped"]
    pub fn enter_remote_apply(&self) -> RemoteApplyScope<'_> {
        let previous = self.applying_remote.swap(true, Ordering::AcqRel);
        RemoteApplyScope {
            guard: self,
            previous,
        }
    }
}

/// Scope of one remote apply; see [`OriginGuard::enter_remote_apply`]
#[derive(Debug)]
pub struct RemoteApplyScope<'a> {
    guard: &'a OriginGuard,
    previous: bool,
}

impl Drop for RemoteApplyScope<'_> {
    fn drop(&mut self) {
        self.guard
            .applying_remote
            .store(self.previous, Ordering::Release);
    }
}
