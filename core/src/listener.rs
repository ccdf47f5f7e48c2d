//! Contracts for the collaborators a `FetchTask` talks to.
//!
//! The task owns none of these behaviours; the caller supplies them.

use crate::types::FetchResult;

/// Receives the single terminal outcome of a task.
///
/// Exactly one method fires per task that reaches a terminal state, and
/// neither fires if the task was cancelled by its owner. Implementations
/// must not block for long: they run on the context that drives the task.
pub trait ResultListener: Send + Sync {
    fn on_response_fetched(&self, result: FetchResult);

    /// Offline, bad configuration, malformed body, retries exhausted: the
    /// listener is not told which.
    fn on_request_failed(&self);
}

/// "Work in progress" affordance, owned by exactly one task for its lifetime.
pub trait ProgressIndicator: Send {
    fn show(&mut self);
    fn dismiss(&mut self);
}

/// Whether the device currently has a network.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

impl<F> Connectivity for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_online(&self) -> bool {
        self()
    }
}

/// Whether whatever will display the result is still alive.
///
/// Checked before showing the progress indicator; a target that is already
/// shutting down gets no indicator.
pub trait DeliveryTarget: Send + Sync {
    fn is_active(&self) -> bool;
}

impl<F> DeliveryTarget for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_active(&self) -> bool {
        self()
    }
}

/// A delivery target that never goes away.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysActive;

impl DeliveryTarget for AlwaysActive {
    fn is_active(&self) -> bool {
        true
    }
}
