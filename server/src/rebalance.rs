//! When the master asks a worker to hand back queued columns.
//!
//! The pull protocol never needs it: workers only ever hold the column they
//! are rendering. The hook exists so a policy can reclaim work from slow
//! workers without touching the coordination loop.

use crate::scheduler::SessionView;

pub trait RebalancePolicy: Send {
    /// Consulted after every event that touches `session`. Returning a count
    /// sends that worker a REM_COL request.
    fn relinquish_request(&self, session: &SessionView, unassigned: usize) -> Option<u32>;
}

/// The default: never ask.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRebalance;

impl RebalancePolicy for NeverRebalance {
    fn relinquish_request(&self, _session: &SessionView, _unassigned: usize) -> Option<u32> {
        None
    }
}
