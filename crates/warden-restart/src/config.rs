//! Restart configuration and state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// RestartConfig
// ---------------------------------------------------------------------------

/// Lead times and wording for the restart warning timeline.
///
/// Deserialized from the `[restart]` section. The defaults give players
/// thirty minutes of notice: a first warning, a reminder one minute
/// before, then a short grace period after the final notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartConfig {
    /// Time between the first warning and the one-minute reminder.
    pub first_warning_secs: u64,

    /// Time between the reminder and the final notice.
    pub final_warning_secs: u64,

    /// Pause after the final notice so it reaches clients before the
    /// server goes down.
    pub grace_secs: u64,

    /// Upper bound on any single control call made by the workflow,
    /// except the restart itself.
    pub call_timeout_secs: u64,

    /// Upper bound on the process-manager restart. Stopping the server
    /// saves the world and shuts down the JVM, which can take minutes.
    pub restart_timeout_secs: u64,

    /// Broadcast when the restart is scheduled.
    pub first_warning_message: String,

    /// Broadcast `final_warning_secs` before the restart.
    pub final_warning_message: String,

    /// Broadcast right before restarting. Empty disables it.
    pub restart_message: String,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            first_warning_secs: 29 * 60,
            final_warning_secs: 60,
            grace_secs: 5,
            call_timeout_secs: 15,
            restart_timeout_secs: 120,
            first_warning_message: "SERVER UPDATE AVAILABLE! Server will restart in 30 minutes. \
                                    Please finish your current activities."
                .to_string(),
            final_warning_message: "SERVER RESTART IN 1 MINUTE! Please save your progress \
                                    and find a safe location!"
                .to_string(),
            restart_message: "Server restarting now for updates...".to_string(),
        }
    }
}

impl RestartConfig {
    /// Fixes values that would make the workflow misbehave.
    ///
    /// Called by [`RestartScheduler::new`](crate::RestartScheduler::new).
    /// A zero call timeout would fail every control call, so it is raised
    /// to one second. The restart timeout is never shorter than the call
    /// timeout.
    pub fn validated(mut self) -> Self {
        if self.call_timeout_secs == 0 {
            warn!("restart.call_timeout_secs is 0, using 1");
            self.call_timeout_secs = 1;
        }
        if self.restart_timeout_secs < self.call_timeout_secs {
            warn!(
                restart_timeout = self.restart_timeout_secs,
                call_timeout = self.call_timeout_secs,
                "restart.restart_timeout_secs below call timeout, raising"
            );
            self.restart_timeout_secs = self.call_timeout_secs;
        }
        self
    }

    pub fn first_warning_lead(&self) -> Duration {
        Duration::from_secs(self.first_warning_secs)
    }

    pub fn final_warning_lead(&self) -> Duration {
        Duration::from_secs(self.final_warning_secs)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn restart_timeout(&self) -> Duration {
        Duration::from_secs(self.restart_timeout_secs)
    }

    /// Total time from the first warning to the restart command.
    pub fn total_lead(&self) -> Duration {
        self.first_warning_lead() + self.final_warning_lead() + self.grace()
    }
}

// ---------------------------------------------------------------------------
// RestartPhase
// ---------------------------------------------------------------------------

/// Where the restart workflow currently is.
///
/// ```text
/// Idle → Evaluating → Scheduled → Warning1 → Executing → Idle
///             │                                  ▲
///             └──────────── (empty server) ──────┘
/// ```
///
/// - **Idle**: nothing pending. The only phase that accepts a new run.
/// - **Evaluating**: a request was claimed; the player count is being
///   queried. Unknown count sends it back to Idle.
/// - **Scheduled**: the thirty-minute warning went out; waiting for the
///   first lead time.
/// - **Warning1**: the one-minute warning went out; waiting for the final
///   lead time and grace period.
/// - **Executing**: save and restart commands are being issued. Not
///   cancellable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestartPhase {
    Idle,
    Evaluating,
    Scheduled,
    Warning1,
    Executing,
}

impl RestartPhase {
    /// Returns `true` if no workflow is running.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns `true` if a cancellation would be honoured.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Evaluating | Self::Scheduled | Self::Warning1)
    }

    /// Returns `true` while players are being warned.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Scheduled | Self::Warning1)
    }

    /// Returns `true` if moving to `target` is a legal transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        use RestartPhase::*;
        matches!(
            (self, target),
            (Idle, Evaluating)
                | (Evaluating, Idle | Scheduled | Executing)
                | (Scheduled, Warning1 | Idle)
                | (Warning1, Executing | Idle)
                | (Executing, Idle)
        )
    }
}

impl std::fmt::Display for RestartPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Evaluating => write!(f, "Evaluating"),
            Self::Scheduled => write!(f, "Scheduled"),
            Self::Warning1 => write!(f, "Warning1"),
            Self::Executing => write!(f, "Executing"),
        }
    }
}
