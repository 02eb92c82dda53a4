//! Steam-backed [`UpdateSource`].

use serde_json::Value;
use tracing::debug;

use crate::{AddonMetadata, SourceError, SteamConfig, UpdateSource};

/// Queries steamcmd.net and the Steam Web API.
#[derive(Debug, Clone)]
pub struct SteamSource {
    client: reqwest::Client,
    app_id: String,
    api_key: Option<String>,
    steamcmd_url: String,
    steam_api_url: String,
}

impl SteamSource {
    /// Builds the source and its HTTP client from the `[steam]` section.
    pub fn from_config(config: &SteamConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("warden/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SourceError::Client(e.to_string()))?;

        Ok(Self {
            client,
            app_id: config.app_id.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            steamcmd_url: config.steamcmd_url.trim_end_matches('/').to_string(),
            steam_api_url: config.steam_api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_json(&self, request: reqwest::RequestBuilder, url: &str) -> Result<Value, SourceError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.json().await?)
    }
}

impl UpdateSource for SteamSource {
    async fn game_build_id(&self) -> Result<String, SourceError> {
        let url = format!("{}/v1/info/{}", self.steamcmd_url, self.app_id);
        let json = self.fetch_json(self.client.get(&url), &url).await?;
        let build = parse_build_id(&json, &self.app_id)?;
        debug!(app_id = %self.app_id, build = %build, "fetched game build id");
        Ok(build)
    }

    async fn addon_metadata(&self, id: &str) -> Result<AddonMetadata, SourceError> {
        let url = format!(
            "{}/ISteamRemoteStorage/GetPublishedFileDetails/v1/",
            self.steam_api_url
        );
        let mut form = vec![
            ("itemcount", "1".to_string()),
            ("publishedfileids[0]", id.to_string()),
        ];
        if let Some(key) = &self.api_key {
            form.push(("key", key.clone()));
        }

        let json = self
            .fetch_json(self.client.post(&url).form(&form), &url)
            .await?;
        let meta = parse_addon_metadata(&json, id)?;
        debug!(addon = id, last_updated = meta.last_updated, "fetched addon metadata");
        Ok(meta)
    }
}

/// Reads `data.<app>.depots.branches.public.buildid`.
///
/// steamcmd.net reports the id as a string; older mirrors used a bare
/// number, so both are accepted.
pub(crate) fn parse_build_id(json: &Value, app_id: &str) -> Result<String, SourceError> {
    let build = json
        .get("data")
        .and_then(|d| d.get(app_id))
        .and_then(|a| a.get("depots"))
        .and_then(|d| d.get("branches"))
        .and_then(|b| b.get("public"))
        .and_then(|p| p.get("buildid"))
        .ok_or_else(|| {
            SourceError::MissingField(format!("data.{app_id}.depots.branches.public.buildid"))
        })?;

    match build {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(SourceError::MissingField(format!(
            "data.{app_id}.depots.branches.public.buildid"
        ))),
    }
}

/// Reads `response.publishedfiledetails[0].time_updated`.
///
/// Steam sets `result` to 1 for a visible item; anything else (deleted,
/// hidden, bad id) comes back without `time_updated`.
pub(crate) fn parse_addon_metadata(json: &Value, id: &str) -> Result<AddonMetadata, SourceError> {
    let details = json
        .get("response")
        .and_then(|r| r.get("publishedfiledetails"))
        .and_then(|d| d.get(0))
        .ok_or_else(|| SourceError::MissingField("response.publishedfiledetails[0]".into()))?;

    if details.get("result").and_then(Value::as_i64).unwrap_or(1) != 1 {
        return Err(SourceError::AddonNotFound(id.to_string()));
    }

    let last_updated = details
        .get("time_updated")
        .and_then(Value::as_i64)
        .ok_or_else(|| SourceError::MissingField("publishedfiledetails[0].time_updated".into()))?;

    Ok(AddonMetadata { last_updated })
}
