//! Control channel configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection parameters for the game server's control channel.
///
/// Deserialized from the `[server]` section of the Warden config file.
/// Every field has a default, so a partial section is fine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Host the RCON listener is bound to.
    pub host: String,

    /// RCON TCP port.
    pub rcon_port: u16,

    /// RCON password (`RCONPassword` in the server ini).
    pub rcon_password: String,

    /// systemd unit name of the game server.
    pub service_name: String,

    /// Prefix `systemctl restart` with `sudo`.
    pub use_sudo: bool,

    /// Upper bound on a single control call, in seconds.
    pub command_timeout_secs: u64,

    /// Console command that makes the server check its addons for
    /// updates.
    pub update_check_command: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            rcon_port: 27015,
            rcon_password: String::new(),
            service_name: "zomboid".to_string(),
            use_sudo: true,
            command_timeout_secs: 10,
            update_check_command: "checkModsNeedUpdate".to_string(),
        }
    }
}

impl ControlConfig {
    /// `host:port` of the RCON listener.
    pub fn rcon_addr(&self) -> String {
        format!("{}:{}", self.host, self.rcon_port)
    }

    /// Per-call timeout.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}
