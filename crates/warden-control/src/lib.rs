//! Control channel for the running game server.
//!
//! Provides the [`ServerControl`] trait the restart workflow drives, and
//! [`RconControl`], the production implementation:
//!
//! - console commands (player list, broadcast, save, update check) go
//!   over Source RCON via [`RconClient`];
//! - restarts and liveness checks go to the host process manager via
//!   [`SystemdManager`].
//!
//! # Testing
//!
//! The scheduler never knows whether it is talking to a real server. Tests
//! plug in a recording mock; production plugs in [`RconControl`].

#![allow(async_fn_in_trait)]

mod config;
mod control;
mod error;
mod players;
mod rcon;
mod systemd;

pub use config::ControlConfig;
pub use control::RconControl;
pub use error::ControlError;
pub use players::{PlayerCount, parse_player_count};
pub use rcon::RconClient;
pub use systemd::SystemdManager;

use std::future::Future;

/// Commands the restart workflow can issue against the game server.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → the control handle is shared between the
///   monitor loop and the restart workflow task.
/// - Every method returns a `Send` future so the workflow can run on a
///   spawned Tokio task.
///
/// Implementations should bound their own I/O; the scheduler also wraps
/// every call in a timeout.
pub trait ServerControl: Send + Sync + 'static {
    /// Number of connected players. Never fails: a query that cannot be
    /// answered yields [`PlayerCount::Unknown`].
    fn player_count(&self) -> impl Future<Output = PlayerCount> + Send;

    /// Sends a chat message to every connected player.
    fn broadcast(
        &self,
        message: &str,
    ) -> impl Future<Output = Result<(), ControlError>> + Send;

    /// Asks the server to persist the world.
    fn request_save(&self) -> impl Future<Output = Result<(), ControlError>> + Send;

    /// Asks the host process manager to restart the server.
    ///
    /// Failures are reported as [`ControlError::ProcessManager`].
    fn request_restart(&self) -> impl Future<Output = Result<(), ControlError>> + Send;

    /// Asks the server to check its own addons for updates.
    fn trigger_update_check(
        &self,
    ) -> impl Future<Output = Result<(), ControlError>> + Send;

    /// Whether the host process manager reports the server as running.
    fn is_running(&self) -> impl Future<Output = Result<bool, ControlError>> + Send;
}
