//! # Warden
//!
//! Keeps a Project Zomboid dedicated server on the latest game build and
//! workshop addons.
//!
//! Every few minutes the [`MonitorLoop`] asks Steam for the current game
//! build and addon update times, compares them with what it saw last
//! (persisted in SQLite), and when anything changed hands one restart
//! request to the [`RestartScheduler`]. The scheduler restarts an empty
//! server right away, or warns connected players thirty minutes ahead.
//!
//! ## Layers
//!
//! - `warden-source`: where build identifiers come from ([`UpdateSource`])
//! - `warden-store`: last-seen identifiers ([`VersionStore`])
//! - `warden-control`: talking to the server ([`ServerControl`], RCON + systemd)
//! - `warden-restart`: the restart state machine and warning timeline
//! - `warden` (this crate): configuration, the monitor loop, the binary
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use warden::prelude::*;
//!
//! # async fn start() -> Result<(), WardenError> {
//! let config = WardenConfig::load("warden.toml")?;
//! let mut monitor = MonitorLoop::from_config(&config)?;
//! monitor.run(async { let _ = tokio::signal::ctrl_c().await; }).await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod monitor;

pub use config::{MonitorConfig, WardenConfig};
pub use error::WardenError;
pub use monitor::{MonitorLoop, TickReport};

pub use warden_control::{ControlConfig, PlayerCount, RconControl, ServerControl};
pub use warden_restart::{
    RestartConfig, RestartOutcome, RestartPhase, RestartReason, RestartRequest, RestartScheduler,
    Submission,
};
pub use warden_source::{AddonMetadata, SteamConfig, SteamSource, UpdateSource};
pub use warden_store::{Subject, VersionStore};

/// Everything needed to embed the monitor.
pub mod prelude {
    pub use crate::{
        ControlConfig, MonitorConfig, MonitorLoop, PlayerCount, RconControl, RestartConfig,
        RestartPhase, RestartScheduler, ServerControl, SteamConfig, SteamSource, Subject,
        TickReport, UpdateSource, VersionStore, WardenConfig, WardenError,
    };
}
