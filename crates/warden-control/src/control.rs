//! Production [`ServerControl`]: RCON for console commands, systemd for
//! the process.

use tracing::{error, info, warn};

use crate::{
    ControlConfig, ControlError, PlayerCount, RconClient, ServerControl, SystemdManager,
    parse_player_count,
};

/// [`ServerControl`] backed by an RCON endpoint and a systemd unit.
#[derive(Debug, Clone)]
pub struct RconControl {
    rcon: RconClient,
    systemd: SystemdManager,
    update_check_command: String,
}

impl RconControl {
    /// Builds the control handle from the `[server]` config section.
    pub fn from_config(config: &ControlConfig) -> Self {
        Self::new(
            RconClient::new(
                config.rcon_addr(),
                config.rcon_password.clone(),
                config.command_timeout(),
            ),
            SystemdManager::new(config.service_name.clone(), config.use_sudo),
        )
        .with_update_check_command(config.update_check_command.clone())
    }

    pub fn new(rcon: RconClient, systemd: SystemdManager) -> Self {
        Self {
            rcon,
            systemd,
            update_check_command: ControlConfig::default().update_check_command,
        }
    }

    pub fn with_update_check_command(mut self, command: impl Into<String>) -> Self {
        self.update_check_command = command.into();
        self
    }
}

/// Quotes a chat message for the `servermsg` console command.
pub(crate) fn servermsg_command(message: &str) -> String {
    let escaped = message.replace('\\', "\\\\").replace('"', "\\\"");
    format!("servermsg \"{escaped}\"")
}

impl ServerControl for RconControl {
    async fn player_count(&self) -> PlayerCount {
        match self.rcon.execute("players").await {
            Ok(output) => match parse_player_count(&output) {
                Some(n) => PlayerCount::Known(n),
                None => {
                    warn!(output = %output.trim(), "unrecognised players output");
                    PlayerCount::Unknown
                }
            },
            Err(e) => {
                error!(addr = %self.rcon.addr(), error = %e, "player count query failed");
                PlayerCount::Unknown
            }
        }
    }

    async fn broadcast(&self, message: &str) -> Result<(), ControlError> {
        self.rcon.execute(&servermsg_command(message)).await?;
        info!(text = message, "broadcast sent");
        Ok(())
    }

    async fn request_save(&self) -> Result<(), ControlError> {
        self.rcon.execute("save").await?;
        info!("world save requested");
        Ok(())
    }

    async fn request_restart(&self) -> Result<(), ControlError> {
        self.systemd.restart().await
    }

    async fn trigger_update_check(&self) -> Result<(), ControlError> {
        self.rcon.execute(&self.update_check_command).await?;
        Ok(())
    }

    async fn is_running(&self) -> Result<bool, ControlError> {
        self.systemd.is_active().await
    }
}
