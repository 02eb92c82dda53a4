//! Update source configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The `[steam]` section of the Warden config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SteamConfig {
    /// Steam app id of the dedicated server's game (Project Zomboid).
    pub app_id: String,

    /// Workshop item ids whose updates should trigger a restart.
    pub workshop_items: Vec<String>,

    /// Optional Steam Web API key, sent as `key`.
    pub api_key: Option<String>,

    /// Base URL of the steamcmd info API.
    pub steamcmd_url: String,

    /// Base URL of the Steam Web API.
    pub steam_api_url: String,

    /// HTTP timeout per request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for SteamConfig {
    fn default() -> Self {
        Self {
            app_id: "108600".to_string(),
            workshop_items: Vec::new(),
            api_key: None,
            steamcmd_url: "https://api.steamcmd.net".to_string(),
            steam_api_url: "https://api.steampowered.com".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl SteamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Workshop ids with surrounding whitespace removed and blanks
    /// dropped (`"1, ,2"` style lists are common in hand-written
    /// configs).
    pub fn tracked_addons(&self) -> Vec<String> {
        self.workshop_items
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
}
