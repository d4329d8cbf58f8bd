//! Jellyfin library refresh after a transcode lands.

use std::time::Duration;

use serde::Deserialize;

/// HTTP request timeout for a single Jellyfin call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Query string used for every library refresh.
const REFRESH_QUERY: &str = "Recursive=true&ImageRefreshMode=Default&MetadataRefreshMode=Default\
    &ReplaceAllImages=false&RegenerateTrickplay=false&ReplaceAllMetadata=false";

#[derive(Debug, thiserror::Error)]
pub enum JellyfinError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("Jellyfin returned HTTP {0}")]
    HttpStatus(u16),
}

/// One entry of `GET /Library/VirtualFolders`.
#[derive(Debug, Clone, Deserialize)]
pub struct VirtualFolder {
    #[serde(rename = "ItemId")]
    pub item_id: Option<String>,
    #[serde(rename = "Name")]
    pub name: Option<String>,
}

/// Minimal Jellyfin API client authenticated with an API key.
pub struct JellyfinClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl JellyfinClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, JellyfinError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// List all libraries.
    pub async fn virtual_folders(&self) -> Result<Vec<VirtualFolder>, JellyfinError> {
        let response = self
            .client
            .get(format!("{}/Library/VirtualFolders", self.base_url))
            .header("X-Emby-Token", &self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(JellyfinError::HttpStatus(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }

    /// Trigger a recursive metadata refresh of one library.
    pub async fn refresh_library(&self, item_id: &str) -> Result<(), JellyfinError> {
        let url = format!("{}/Items/{item_id}/Refresh?{REFRESH_QUERY}", self.base_url);
        let response = self
            .client
            .post(url)
            .header("X-Emby-Token", &self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(JellyfinError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }

    /// Refresh every library that has an id.
    ///
    /// Failing to list libraries is an error; a failure on one library is
    /// logged and does not stop the others. Returns how many refreshes were
    /// triggered.
    pub async fn refresh_all_libraries(&self) -> Result<usize, JellyfinError> {
        let libraries = self.virtual_folders().await?;
        if libraries.is_empty() {
            tracing::info!("No Jellyfin libraries found");
            return Ok(0);
        }

        let mut triggered = 0;
        for library in &libraries {
            let name = library.name.as_deref().unwrap_or("Unknown");
            let Some(id) = library.item_id.as_deref().filter(|id| !id.is_empty()) else {
                tracing::warn!(library = name, "Skipping library without id");
                continue;
            };

            match self.refresh_library(id).await {
                Ok(()) => {
                    tracing::info!(library = name, id, "Library scan triggered");
                    triggered += 1;
                }
                Err(e) => {
                    tracing::error!(library = name, id, error = %e, "Failed to scan library");
                }
            }
        }
        Ok(triggered)
    }
}
