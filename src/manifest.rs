//! Remote digest manifest probe.
//!
//! The publishing side keeps a tiny manifest next to each launcher
//! build: one line containing the MD5 of the artifact. Fetching it is
//! how the bootstrap learns whether an update exists without paying for
//! the artifact download.

use anyhow::{Context, Result};
use tracing::debug;

use crate::http::no_cache_headers;

/// One-shot fetch of the published artifact digest.
///
/// The probe makes exactly one request and never retries; on failure the
/// orchestrator falls back to an unconditional background download, so
/// a flaky manifest endpoint degrades to extra bandwidth rather than a
/// failed launch.
pub struct ManifestProbe {
    client: reqwest::Client,
    url: String,
}

impl ManifestProbe {
    /// Create a probe against the given manifest URL.
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Fetch the published digest.
    ///
    /// Sends a GET with caching disabled and no conditional headers,
    /// and returns the first non-empty line of the body, trimmed. The
    /// digest is not validated beyond that; a malformed value simply
    /// fails the equality comparison later and triggers a download.
    pub async fn fetch_remote_digest(&self) -> Result<String> {
        debug!("Fetching digest manifest from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .headers(no_cache_headers())
            .send()
            .await
            .with_context(|| format!("Failed to fetch digest manifest from {}", self.url))?
            .error_for_status()
            .with_context(|| format!("Digest manifest request failed for {}", self.url))?;

        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read digest manifest from {}", self.url))?;

        let digest = body
            .lines()
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Empty digest manifest at {}", self.url))?;

        debug!("Remote digest is {digest}");
        Ok(digest.to_string())
    }
}
