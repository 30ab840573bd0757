//! Artifact download with retry, verification, and progress signals.
//!
//! The downloader issues a conditional GET against the launcher's
//! download URL and classifies the response by status class:
//!
//! - **2xx**: an update exists; the body streams to the pending path
//!   while being hashed, then the digest is checked against the
//!   response's `ETag`
//! - **4xx**: treated as transient ("Remote file not found.") and
//!   retried; publishing windows briefly 404 while a new build uploads
//! - **anything else** (notably 304 from the conditional GET): a
//!   definitive "no update", no retry
//!
//! Network errors and digest mismatches consume attempts; after
//! [`MAX_DOWNLOAD_ATTEMPTS`] the run gives up. Progress is reported
//! through two one-shot signals so a control task can wait with a bound
//! on "is there an update?" but without one on "is it downloaded?".

use anyhow::{Context, Result};
use futures::StreamExt;
use md5::{Digest, Md5};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::checksum::ChecksumVerifier;
use crate::constants::MAX_DOWNLOAD_ATTEMPTS;
use crate::http::no_cache_headers;
use crate::sink::LogSink;

/// Final outcome of a downloader run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// A new artifact was downloaded, verified, and left at the pending
    /// path.
    Downloaded,
    /// The remote definitively reported that no update exists.
    NoUpdate,
    /// Every attempt was consumed without a definitive answer.
    Failed,
}

/// Sending half of the downloader's progress signals.
///
/// Each signal fires at most once; later calls are no-ops. Sends ignore
/// a dropped receiver because the waiter is allowed to move on (launch
/// the old artifact) while the download keeps running detached.
pub struct UpdateSignals {
    found: Option<oneshot::Sender<bool>>,
    complete: Option<oneshot::Sender<()>>,
}

impl UpdateSignals {
    /// Report whether an update exists. First call wins.
    fn update_found(&mut self, found: bool) {
        if let Some(sender) = self.found.take() {
            let _ = sender.send(found);
        }
    }

    /// Report that the pending artifact is fully written and closed.
    fn download_complete(&mut self) {
        if let Some(sender) = self.complete.take() {
            let _ = sender.send(());
        }
    }
}

/// Receiving half of the downloader's progress signals.
pub struct UpdateWatch {
    /// Resolves to `true` the moment a 2xx response confirms an update
    /// exists (before the body has streamed), or `false` on a
    /// definitive "no update". Never resolves if the run fails.
    pub found: oneshot::Receiver<bool>,
    /// Resolves once the pending artifact is verified and closed.
    pub complete: oneshot::Receiver<()>,
}

/// Create a connected signal pair for one downloader run.
#[must_use]
pub fn update_channel() -> (UpdateSignals, UpdateWatch) {
    let (found_tx, found_rx) = oneshot::channel();
    let (complete_tx, complete_rx) = oneshot::channel();
    (
        UpdateSignals {
            found: Some(found_tx),
            complete: Some(complete_tx),
        },
        UpdateWatch {
            found: found_rx,
            complete: complete_rx,
        },
    )
}

/// How a single attempt ended, before retry accounting.
enum AttemptOutcome {
    Downloaded,
    NoUpdate,
    Retry,
}

/// Downloads one artifact to its pending path, retrying transient
/// failures.
///
/// A downloader is single-use: construct, optionally attach the known
/// local digest for a conditional request, then [`run`](Self::run) it
/// to completion. The orchestrator either awaits the run directly
/// (forced mode) or spawns it and watches the signals.
pub struct Downloader {
    client: reqwest::Client,
    url: String,
    target: PathBuf,
    known_digest: Option<String>,
    signals: UpdateSignals,
    sink: Arc<dyn LogSink>,
}

impl Downloader {
    /// Create a downloader writing to `target`.
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        target: PathBuf,
        signals: UpdateSignals,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            target,
            known_digest: None,
            signals,
            sink,
        }
    }

    /// Attach the digest of the currently installed artifact.
    ///
    /// When present it is sent lowercased as `If-None-Match`, letting
    /// the server answer 304 instead of shipping an identical body.
    #[must_use]
    pub fn with_known_digest(mut self, digest: Option<String>) -> Self {
        self.known_digest = digest;
        self
    }

    /// Run the download to completion.
    ///
    /// Consumes up to [`MAX_DOWNLOAD_ATTEMPTS`] attempts, each on a
    /// fresh connection. Attempt failures are logged with a
    /// recognizable hint where the cause is a known local problem
    /// (broken TCP/IP stack, missing root certificates).
    pub async fn run(mut self) -> DownloadOutcome {
        for attempt in 1..=MAX_DOWNLOAD_ATTEMPTS {
            match self.attempt(attempt).await {
                Ok(AttemptOutcome::Downloaded) => {
                    self.signals.download_complete();
                    return DownloadOutcome::Downloaded;
                }
                Ok(AttemptOutcome::NoUpdate) => {
                    self.signals.update_found(false);
                    self.sink.write_line("No update found.");
                    return DownloadOutcome::NoUpdate;
                }
                Ok(AttemptOutcome::Retry) => {}
                Err(error) => {
                    warn!("download attempt {attempt} failed: {error:#}");
                    self.sink.write_line(&format!("Download failed: {error:#}"));
                    if let Some(hint) = connection_hint(&error) {
                        self.sink.write_line(hint);
                    }
                }
            }
        }

        self.sink.write_line(
            "Unable to download remote file. Check your internet connection/proxy settings.",
        );
        DownloadOutcome::Failed
    }

    async fn attempt(&mut self, attempt: u32) -> Result<AttemptOutcome> {
        if attempt == 1 {
            self.sink.write_line(&format!("Downloading: {}", self.url));
        } else {
            self.sink.write_line(&format!(
                "Downloading: {} (try {attempt}/{MAX_DOWNLOAD_ATTEMPTS})",
                self.url
            ));
        }

        let started = Instant::now();
        let mut request = self.client.get(&self.url).headers(no_cache_headers());
        if let Some(digest) = &self.known_digest {
            request = request.header(reqwest::header::IF_NONE_MATCH, digest.to_lowercase());
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to connect to {}", self.url))?;
        self.sink.write_line(&format!("Got reply in: {}ms", started.elapsed().as_millis()));

        let status = response.status().as_u16();
        match status / 100 {
            2 => {
                let integrity_tag = response
                    .headers()
                    .get(reqwest::header::ETAG)
                    .and_then(|value| value.to_str().ok())
                    .map(|tag| tag.trim_matches('"').to_string());

                // An update definitively exists; let the control task
                // know before the (possibly long) body transfer starts.
                self.signals.update_found(true);

                let (bytes, digest) = self.stream_to_target(response).await?;

                let elapsed = started.elapsed().as_secs_f64().max(0.001);
                let kb = bytes as f64 / 1024.0;
                self.sink.write_line(&format!(
                    "Downloaded {kb:.1}kb in {}s at {:.1}kb/s",
                    elapsed as u64,
                    kb / elapsed
                ));

                match integrity_tag {
                    Some(tag) if !ChecksumVerifier::digests_match(&tag, &digest) => {
                        debug!("integrity tag {tag} does not match computed digest {digest}");
                        self.sink
                            .write_line("After downloading, the digest didn't match. Retrying.");
                        Ok(AttemptOutcome::Retry)
                    }
                    _ => Ok(AttemptOutcome::Downloaded),
                }
            }
            4 => {
                self.sink.write_line("Remote file not found.");
                Ok(AttemptOutcome::Retry)
            }
            _ => {
                debug!("status {status} treated as no-update");
                Ok(AttemptOutcome::NoUpdate)
            }
        }
    }

    /// Stream the response body to the pending path, hashing as it goes.
    ///
    /// Returns the byte count and computed digest. The file is flushed
    /// and closed before returning, so a `Downloaded` outcome always
    /// refers to a complete file on disk.
    async fn stream_to_target(&self, response: reqwest::Response) -> Result<(u64, String)> {
        let mut file = File::create(&self.target)
            .await
            .with_context(|| format!("Failed to create {}", self.target.display()))?;

        let mut hasher = Md5::new();
        let mut bytes: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Failed while reading download stream")?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", self.target.display()))?;
            bytes += chunk.len() as u64;
        }
        file.flush()
            .await
            .with_context(|| format!("Failed to flush {}", self.target.display()))?;
        drop(file);

        Ok((bytes, hex::encode(hasher.finalize())))
    }
}

/// Hint line for error categories users can actually fix locally.
fn connection_hint(error: &anyhow::Error) -> Option<&'static str> {
    for cause in error.chain() {
        if let Some(io_error) = cause.downcast_ref::<std::io::Error>() {
            match io_error.kind() {
                std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::AddrInUse
                | std::io::ErrorKind::AddrNotAvailable
                | std::io::ErrorKind::NetworkUnreachable => {
                    return Some("The likely cause is a broken IPv4/IPv6 stack. Check your TCP/IP settings.");
                }
                _ => {}
            }
        }
        if let Some(request_error) = cause.downcast_ref::<reqwest::Error>()
            && request_error.is_connect()
        {
            return Some("The likely cause is a broken IPv4/IPv6 stack. Check your TCP/IP settings.");
        }
        let text = cause.to_string();
        if text.contains("certificate") || text.contains("handshake") {
            return Some(
                "The likely cause is a broken or missing set of trusted root certificates. Check your system clock and certificate store.",
            );
        }
    }
    None
}
