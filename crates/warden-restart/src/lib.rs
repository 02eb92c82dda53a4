//! Restart orchestration for Warden.
//!
//! When an update is detected the server must eventually restart, but
//! players deserve a warning. [`RestartScheduler`] owns that decision and
//! the warning timeline for exactly one server:
//!
//! ```text
//! Idle ──→ Evaluating ──(0 players)──────────────────────→ Executing ──→ Idle
//!               │                                              ▲
//!               └──(N players)──→ Scheduled ──→ Warning1 ──────┘
//! ```
//!
//! - At most one workflow runs at a time. Requests that arrive while one
//!   is in flight are coalesced into it.
//! - The workflow runs on its own Tokio task, so callers never wait for
//!   the timeline.
//! - Cancellation is race-free: every run carries a generation number and
//!   a timer that fires after cancellation finds its generation stale and
//!   does nothing.
//!
//! # Key types
//!
//! - [`RestartScheduler`]: submit, cancel, observe
//! - [`RestartPhase`]: the state machine
//! - [`RestartRequest`] / [`RestartReason`]: why a restart is wanted
//! - [`RestartConfig`]: lead times and message wording

mod config;
mod error;
mod request;
mod scheduler;

pub use config::{RestartConfig, RestartPhase};
pub use error::RestartError;
pub use request::{RestartReason, RestartRequest};
pub use scheduler::{RestartOutcome, RestartScheduler, RestartSnapshot, Submission};
