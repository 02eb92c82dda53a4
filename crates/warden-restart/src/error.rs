//! Error types for the restart layer.

use crate::RestartPhase;

/// Errors returned by [`RestartScheduler::cancel`](crate::RestartScheduler::cancel).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RestartError {
    /// No workflow is running.
    #[error("no restart is scheduled")]
    NothingToCancel,

    /// The workflow has passed the point of no return (the save and
    /// restart commands are being issued).
    #[error("restart cannot be cancelled while {0}")]
    NotCancellable(RestartPhase),
}
