//! Warden configuration file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use warden_control::ControlConfig;
use warden_restart::RestartConfig;
use warden_source::SteamConfig;

use crate::WardenError;

// ---------------------------------------------------------------------------
// MonitorConfig
// ---------------------------------------------------------------------------

/// The `[monitor]` section: how often and what to check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between update checks.
    pub check_interval_secs: u64,

    /// Also check the tracked workshop addons, not just the game build.
    pub check_addons: bool,

    /// Send the server's own update-check command at the start of every
    /// cycle.
    pub trigger_server_check: bool,

    /// Treat the very first identifier seen for a subject as an update.
    /// When `false` it is only recorded.
    pub restart_on_first_observation: bool,

    /// SQLite file holding the last-seen identifiers.
    pub database_path: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 300,
            check_addons: true,
            trigger_server_check: false,
            restart_on_first_observation: false,
            database_path: PathBuf::from("pz_versions.db"),
        }
    }
}

impl MonitorConfig {
    /// Shortest accepted check interval. Steam's public endpoints do not
    /// appreciate being polled every second.
    pub const MIN_CHECK_INTERVAL_SECS: u64 = 10;

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

// ---------------------------------------------------------------------------
// WardenConfig
// ---------------------------------------------------------------------------

/// The whole config file. Every section is optional.
///
/// ```toml
/// [steam]
/// workshop_items = ["2392709985"]
///
/// [server]
/// rcon_password = "secret"
///
/// [monitor]
/// check_interval_secs = 300
///
/// [restart]
/// first_warning_secs = 1740
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub steam: SteamConfig,
    pub server: ControlConfig,
    pub monitor: MonitorConfig,
    pub restart: RestartConfig,
}

impl WardenConfig {
    /// Reads, parses and validates the TOML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WardenError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| WardenError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parses and validates TOML text.
    pub fn parse(content: &str) -> Result<Self, WardenError> {
        let config: Self = toml::from_str(content)?;
        Ok(config.validated())
    }

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Rules:
    /// - `monitor.check_interval_secs` raised to
    ///   [`MonitorConfig::MIN_CHECK_INTERVAL_SECS`].
    /// - `server.command_timeout_secs` and `steam.request_timeout_secs`
    ///   raised to 1.
    /// - Blank workshop ids dropped, the rest trimmed.
    /// - `[restart]` fixed by [`RestartConfig::validated`].
    pub fn validated(mut self) -> Self {
        if self.monitor.check_interval_secs < MonitorConfig::MIN_CHECK_INTERVAL_SECS {
            warn!(
                interval = self.monitor.check_interval_secs,
                min = MonitorConfig::MIN_CHECK_INTERVAL_SECS,
                "monitor.check_interval_secs below minimum, clamping"
            );
            self.monitor.check_interval_secs = MonitorConfig::MIN_CHECK_INTERVAL_SECS;
        }
        if self.server.command_timeout_secs == 0 {
            warn!("server.command_timeout_secs is 0, using 1");
            self.server.command_timeout_secs = 1;
        }
        if self.steam.request_timeout_secs == 0 {
            warn!("steam.request_timeout_secs is 0, using 1");
            self.steam.request_timeout_secs = 1;
        }

        let addons = self.steam.tracked_addons();
        if addons.len() != self.steam.workshop_items.len() {
            warn!(
                configured = self.steam.workshop_items.len(),
                kept = addons.len(),
                "blank workshop item ids ignored"
            );
        }
        self.steam.workshop_items = addons;

        if self.server.rcon_password.is_empty() {
            warn!("server.rcon_password is empty, RCON login will likely fail");
        }

        self.restart = self.restart.validated();
        self
    }
}
