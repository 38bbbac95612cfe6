//! Torrentio addon client
//!
//! Fetches raw stream records from the Torrentio Stremio addon. Ranking and
//! deduplication happen in `catalog`; this client only speaks the protocol.

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::TorrentioConfig;
use crate::models::{AddonResponse, RawStream};

/// Torrentio addon client
pub struct TorrentioClient {
    base_url: String,
    /// Addon configuration path segment (e.g. "sort=qualitysize")
    options: String,
    client: reqwest::Client,
}

impl TorrentioClient {
    /// Create a new Torrentio client with default settings
    pub fn new() -> Self {
        Self::from_config(&TorrentioConfig::default())
    }

    pub fn from_config(config: &TorrentioConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            options: config.options.trim_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client with a custom base URL and no addon options (for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            options: String::new(),
            client: reqwest::Client::new(),
        }
    }

    /// Replace the addon options segment
    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        let options: String = options.into();
        self.options = options.trim_matches('/').to_string();
        self
    }

    /// Get streams for a movie by IMDB ID
    pub async fn movie_streams(&self, imdb_id: &str) -> Result<Vec<RawStream>> {
        let url = self.stream_url(&format!("movie/{}", imdb_id));
        self.fetch_streams(&url).await
    }

    /// Get streams for a TV episode by IMDB ID and episode info
    pub async fn episode_streams(
        &self,
        imdb_id: &str,
        season: u16,
        episode: u16,
    ) -> Result<Vec<RawStream>> {
        let url = self.stream_url(&format!("series/{}:{}:{}", imdb_id, season, episode));
        self.fetch_streams(&url).await
    }

    fn stream_url(&self, resource: &str) -> String {
        if self.options.is_empty() {
            format!("{}/stream/{}.json", self.base_url, resource)
        } else {
            format!("{}/{}/stream/{}.json", self.base_url, self.options, resource)
        }
    }

    /// Fetch and decode streams from a Torrentio URL
    async fn fetch_streams(&self, url: &str) -> Result<Vec<RawStream>> {
        debug!(url, "Fetching streams");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to fetch from Torrentio")?;

        // Check for HTTP errors
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Torrentio returned HTTP {}", status);
        }

        let text = response
            .text()
            .await
            .context("Failed to read response body")?;

        let data: AddonResponse =
            serde_json::from_str(&text).context("Failed to parse JSON response")?;
        debug!(count = data.streams.len(), "Streams received");
        Ok(data.streams)
    }
}

impl Default for TorrentioClient {
    fn default() -> Self {
        Self::new()
    }
}
