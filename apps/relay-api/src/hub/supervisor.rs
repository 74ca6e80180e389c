//! Lifecycle of the shared build-check timer.
//!
//! The timer's state machine is explicit (`Idle` / `Active`) so the
//! "running iff at least one subscriber is connected" invariant can be
//! checked directly rather than inferred from an optional handle.

use tokio::task::JoinHandle;

enum PollState {
    Idle,
    Active(JoinHandle<()>),
}

/// Owns the one recurring poll task a room is allowed to have.
pub struct PollSupervisor {
    state: PollState,
}

impl PollSupervisor {
    pub fn new() -> Self {
        Self {
            state: PollState::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, PollState::Active(_))
    }

    /// Start the poll task if idle. No-op when already active, so concurrent
    /// admissions can never produce a second timer.
    pub fn ensure_started(&mut self, spawn: impl FnOnce() -> JoinHandle<()>) {
        if let PollState::Idle = self.state {
            self.state = PollState::Active(spawn());
        }
    }

    /// Cancel the poll task iff no interested connection remains.
    pub fn stop_if_unneeded(&mut self, interested: usize) {
        if interested > 0 {
            return;
        }
        if let PollState::Active(handle) = std::mem::replace(&mut self.state, PollState::Idle) {
            handle.abort();
        }
    }
}

impl Default for PollSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
