//! The end-to-end update decision procedure.
//!
//! [`Bootstrap`] ties the leaf components together: promote any update
//! left behind by a previous run, decide between a blocking download
//! (forced, or no artifact yet) and a probe-then-maybe-download pass,
//! install whatever arrived, and hand control to the launcher.
//!
//! The probe path is deliberately impatient. After the remote digest
//! says an update exists, the control task gives the background
//! download three seconds to confirm; if confirmation arrives it waits
//! as long as the download takes, and if not it launches the artifact
//! it already has. The download task is never cancelled, so a slow
//! update still lands as a pending file and installs on the next run.
//!
//! Installation only ever follows an observed download-complete signal;
//! a download that confirmed an update and then failed leaves the
//! current build in place.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};

use crate::checksum::ChecksumVerifier;
use crate::config::ProxyConfig;
use crate::constants::{self, PROTOCOL_VERSION, UPDATE_FOUND_WAIT};
use crate::core::BootstrapError;
use crate::download::{DownloadOutcome, Downloader, update_channel};
use crate::http;
use crate::install::Installer;
use crate::launch::{ArtifactLauncher, LaunchContext, ProcessLauncher};
use crate::manifest::ManifestProbe;
use crate::sink::LogSink;
use crate::workdir;

/// Orchestrates one bootstrap pass: update check, install, launch.
pub struct Bootstrap {
    work_dir: PathBuf,
    proxy: ProxyConfig,
    passthrough: Vec<String>,
    sink: Arc<dyn LogSink>,
    download_url: String,
    digest_url: String,
    launcher: Box<dyn ArtifactLauncher>,
}

impl Bootstrap {
    /// Create a bootstrap for the given working directory.
    ///
    /// Uses the production endpoints and the process launcher; tests
    /// swap those out with [`Self::with_endpoints`] and
    /// [`Self::with_launcher`].
    pub fn new(
        work_dir: PathBuf,
        proxy: ProxyConfig,
        passthrough: Vec<String>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            work_dir,
            proxy,
            passthrough,
            sink,
            download_url: constants::download_url(),
            digest_url: constants::digest_url(),
            launcher: Box::new(ProcessLauncher),
        }
    }

    /// Override the remote endpoints.
    #[must_use]
    pub fn with_endpoints(mut self, download_url: String, digest_url: String) -> Self {
        self.download_url = download_url;
        self.digest_url = digest_url;
        self
    }

    /// Override how the installed artifact is started.
    #[must_use]
    pub fn with_launcher(mut self, launcher: Box<dyn ArtifactLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Path of the installed launcher artifact.
    fn canonical(&self) -> PathBuf {
        self.work_dir.join(constants::launcher_file_name())
    }

    /// Path downloads land at until they are promoted.
    fn pending(&self) -> PathBuf {
        self.work_dir.join(constants::pending_file_name())
    }

    /// Run one full bootstrap pass.
    ///
    /// With `force` set the download always runs and must succeed; the
    /// same applies when no artifact is installed yet, since there is
    /// nothing to fall back to.
    pub async fn run(mut self, force: bool) -> Result<()> {
        self.write_banner();
        // The launcher is spawned with its working directory changed,
        // so every path derived below must be absolute.
        self.work_dir = workdir::ensure_work_dir(&self.work_dir).await?;

        if is_file(&self.pending()).await {
            self.sink.write_line("Found cached update");
            self.promote().await?;
        }

        if force || !is_file(&self.canonical()).await {
            self.blocking_download().await?;
            self.promote().await?;
        } else {
            self.probe_then_maybe_download().await?;
        }

        self.sink.write_line("Starting launcher.");
        let context = LaunchContext::new(
            self.work_dir.clone(),
            self.proxy.clone(),
            self.passthrough.clone(),
        );
        self.launcher.launch(&self.canonical(), &context)
    }

    fn write_banner(&self) {
        self.sink.write_line(&format!(
            "{} {} (bootstrap protocol {})",
            constants::APP_NAME,
            env!("CARGO_PKG_VERSION"),
            PROTOCOL_VERSION
        ));
        self.sink.write_line(&format!(
            "Current time is {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        self.sink.write_line(&format!(
            "Host: {} {}",
            std::env::consts::OS,
            std::env::consts::ARCH
        ));
    }

    /// Download on the control task and require success.
    async fn blocking_download(&self) -> Result<()> {
        let client = http::build_client(&self.proxy)?;
        let (signals, _watch) = update_channel();
        let downloader = Downloader::new(
            client,
            self.download_url.clone(),
            self.pending(),
            signals,
            Arc::clone(&self.sink),
        );
        match downloader.run().await {
            DownloadOutcome::Downloaded => Ok(()),
            outcome => {
                debug!("blocking download ended with {outcome:?}");
                Err(BootstrapError::ForcedDownloadFailed.into())
            }
        }
    }

    /// The normal path: an artifact exists, so ask the manifest whether
    /// it is stale before spending any time downloading.
    async fn probe_then_maybe_download(&self) -> Result<()> {
        let local_digest = match ChecksumVerifier::file_digest(&self.canonical()).await {
            Ok(digest) => Some(digest),
            Err(error) => {
                // Unreadable artifact: assume it is stale and fetch
                // unconditionally.
                warn!("could not digest local artifact: {error:#}");
                None
            }
        };

        let client = http::build_client(&self.proxy)?;

        if let Some(local) = &local_digest {
            let probe = ManifestProbe::new(client.clone(), self.digest_url.clone());
            match probe.fetch_remote_digest().await {
                Ok(remote) if ChecksumVerifier::digests_match(local, &remote) => {
                    debug!("local artifact is current (digest {local})");
                    self.sink.write_line("Didn't find an update in time.");
                    return Ok(());
                }
                Ok(remote) => {
                    debug!("remote digest {remote} differs from local {local}");
                }
                Err(error) => {
                    // Update status unknown; launch what we have and let
                    // a detached download try its luck for next run.
                    warn!("manifest probe failed: {error:#}");
                    self.sink.write_line(
                        "Unable to check for updates. Check your internet connection/proxy settings.",
                    );
                    self.spawn_download(client, None);
                    self.sink.write_line("Looking for update");
                    self.sink.write_line("Didn't find an update in time.");
                    return Ok(());
                }
            }
        }

        let watch = self.spawn_download(client, local_digest);
        self.sink.write_line("Looking for update");

        match tokio::time::timeout(UPDATE_FOUND_WAIT, watch.found).await {
            Ok(Ok(true)) => {
                self.sink.write_line("Found update in time, waiting to download");
                // Unbounded: once an update is confirmed we do not
                // launch a build we know is stale. Only an observed
                // complete signal means the pending file is verified;
                // a dropped sender means the downloader gave up and
                // whatever reached the pending path was rejected.
                match watch.complete.await {
                    Ok(()) => self.promote().await?,
                    Err(_) => {
                        debug!("confirmed download never completed; keeping the current build");
                    }
                }
            }
            Ok(Ok(false)) => {
                debug!("remote reported no update");
            }
            Ok(Err(_)) | Err(_) => {
                self.sink.write_line("Didn't find an update in time.");
            }
        }
        Ok(())
    }

    /// Start the downloader on a detached task.
    ///
    /// The handle is dropped on purpose. See the module docs.
    fn spawn_download(
        &self,
        client: reqwest::Client,
        known_digest: Option<String>,
    ) -> crate::download::UpdateWatch {
        let (signals, watch) = update_channel();
        let downloader = Downloader::new(
            client,
            self.download_url.clone(),
            self.pending(),
            signals,
            Arc::clone(&self.sink),
        )
        .with_known_digest(known_digest);
        tokio::spawn(downloader.run());
        watch
    }

    async fn promote(&self) -> Result<()> {
        Installer::new(self.pending(), self.canonical(), Arc::clone(&self.sink))
            .promote()
            .await
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}
