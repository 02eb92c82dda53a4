//! Host process manager integration via `systemctl`.

use tokio::process::Command;
use tracing::{error, info};

use crate::ControlError;

/// Restarts and inspects the game server's systemd unit.
#[derive(Debug, Clone)]
pub struct SystemdManager {
    service: String,
    use_sudo: bool,
    program: String,
}

impl SystemdManager {
    /// Manager for `service`, optionally running `systemctl` via `sudo`.
    pub fn new(service: impl Into<String>, use_sudo: bool) -> Self {
        Self {
            service: service.into(),
            use_sudo,
            program: "systemctl".to_string(),
        }
    }

    /// Replaces the `systemctl` binary, e.g. with a wrapper script.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// The unit this manager controls.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// `systemctl restart <service>`.
    ///
    /// A non-zero exit or a failure to spawn is a
    /// [`ControlError::ProcessManager`].
    pub async fn restart(&self) -> Result<(), ControlError> {
        let mut cmd = if self.use_sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg(&self.program);
            cmd
        } else {
            Command::new(&self.program)
        };
        cmd.arg("restart").arg(&self.service);

        info!(service = %self.service, "restarting game server");
        let status = cmd.status().await.map_err(|e| {
            ControlError::ProcessManager(format!("failed to run {}: {e}", self.program))
        })?;

        if !status.success() {
            error!(service = %self.service, %status, "service restart failed");
            return Err(ControlError::ProcessManager(format!(
                "restart of {} exited with {status}",
                self.service
            )));
        }
        info!(service = %self.service, "game server restarted");
        Ok(())
    }

    /// `systemctl is-active --quiet <service>`; exit 0 means running.
    pub async fn is_active(&self) -> Result<bool, ControlError> {
        let status = Command::new(&self.program)
            .arg("is-active")
            .arg("--quiet")
            .arg(&self.service)
            .status()
            .await
            .map_err(|e| {
                ControlError::ProcessManager(format!("failed to run {}: {e}", self.program))
            })?;
        Ok(status.success())
    }
}
