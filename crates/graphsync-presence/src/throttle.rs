//! Trailing-edge throttle for cursor-only peer updates.
//!
//! At most one cursor-only delivery happens per interval. A change arriving
//! inside the interval schedules one trailing delivery at the interval
//! boundary; further changes before then are folded into it, so the final
//! position is always delivered.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Deliver now
    EmitNow,
    /// Deliver at `deadline`; the timer must present `generation` to
    /// [`CursorThrottle::take_pending`]
    Schedule { deadline: Instant, generation: u64 },
    /// A trailing delivery is already scheduled
    Coalesced,
}

#[derive(Debug, Clone)]
pub struct CursorThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
    /// Generation of the live trailing timer
    pending: Option<u64>,
    generation: u64,
}

impl CursorThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            pending: None,
            generation: 0,
        }
    }

    /// Decide what to do with a cursor-only change observed at `now`.
    /// The caller must call [`Self::mark_emitted`] after an immediate delivery.
    pub fn on_cursor_change(&mut self, now: Instant) -> ThrottleDecision {
        if self.pending.is_some() {
            return ThrottleDecision::Coalesced;
        }

        match self.last_emit {
            Some(last) if now < last + self.interval => {
                self.generation += 1;
                self.pending = Some(self.generation);
                ThrottleDecision::Schedule {
                    deadline: last + self.interval,
                    generation: self.generation,
                }
            }
            _ => ThrottleDecision::EmitNow,
        }
    }

    /// Record a delivery; any scheduled trailing delivery becomes stale
    pub fn mark_emitted(&mut self, now: Instant) {
        self.last_emit = Some(now);
        self.pending = None;
    }

    /// Called when the timer of `generation` fires. Returns whether it should
    /// still deliver; stale timers never do.
    pub fn take_pending(&mut self, generation: u64, now: Instant) -> bool {
        if self.pending != Some(generation) {
            return false;
        }
        self.mark_emitted(now);
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Forget all timing state
    pub fn reset(&mut self) {
        self.last_emit = None;
        self.pending = None;
    }
}
