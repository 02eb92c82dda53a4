//! Upstream update source for Warden.
//!
//! The monitor asks an [`UpdateSource`] for the current build of the game
//! and the last-update time of each tracked workshop addon. Lookups are
//! stateless: the source never remembers what it returned; diffing is
//! the version store's job.
//!
//! [`SteamSource`] is the production implementation (steamcmd.net for the
//! game build id, the Steam Web API for workshop details).

#![allow(async_fn_in_trait)]

mod config;
mod error;
mod steam;

pub use config::SteamConfig;
pub use error::SourceError;
pub use steam::SteamSource;

use std::future::Future;

/// Metadata for one workshop addon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddonMetadata {
    /// Unix timestamp of the addon's last upstream update.
    pub last_updated: i64,
}

impl AddonMetadata {
    /// The opaque build identifier stored for this addon.
    pub fn identifier(&self) -> String {
        self.last_updated.to_string()
    }
}

/// Where current build identifiers come from.
///
/// Same shape as the control seam: `Send + Sync + 'static` so the source
/// can live inside the long-running monitor task, `Send` futures so the
/// monitor can be spawned.
pub trait UpdateSource: Send + Sync + 'static {
    /// Current public build id of the game.
    fn game_build_id(&self) -> impl Future<Output = Result<String, SourceError>> + Send;

    /// Metadata for the workshop item `id`.
    fn addon_metadata(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<AddonMetadata, SourceError>> + Send;
}
