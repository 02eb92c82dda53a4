//! Error types for the control layer.

use std::time::Duration;

use warden_rcon::RconError;

/// Errors that can occur while talking to the game server or its
/// process manager.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// Connecting, reading, or writing the control socket failed.
    #[error("control channel I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The call did not finish within the configured timeout.
    #[error("control call timed out after {0:?}")]
    Timeout(Duration),

    /// The server rejected the RCON password.
    #[error("RCON authentication rejected")]
    AuthFailed,

    /// The server closed the connection mid-exchange.
    #[error("control channel closed by server")]
    ConnectionClosed,

    /// Framing error on the RCON stream.
    #[error(transparent)]
    Protocol(#[from] RconError),

    /// The host process manager could not restart or query the service.
    #[error("process manager error: {0}")]
    ProcessManager(String),
}

impl ControlError {
    /// `true` for failures worth retrying on the next cycle.
    ///
    /// Process manager failures are not transient: the restart
    /// workflow never retries them on its own.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::ProcessManager(_) | Self::AuthFailed)
    }
}
