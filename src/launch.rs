//! Hand-off from the bootstrap to the launcher proper.
//!
//! Once the artifact is current the bootstrap's job is done; it starts
//! the launcher as a child process and forwards the settings it was
//! given. [`ArtifactLauncher`] is a trait so orchestration tests can
//! substitute a recording launcher for the real spawn.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

use crate::config::ProxyConfig;
use crate::constants::PROTOCOL_VERSION;
use crate::core::BootstrapError;

/// Everything the launcher inherits from the bootstrap.
pub struct LaunchContext {
    work_dir: PathBuf,
    proxy: ProxyConfig,
    passthrough: Vec<String>,
    protocol_version: u32,
}

impl LaunchContext {
    /// Build the context handed to the launcher at startup.
    pub fn new(work_dir: PathBuf, proxy: ProxyConfig, passthrough: Vec<String>) -> Self {
        Self {
            work_dir,
            proxy,
            passthrough,
            protocol_version: PROTOCOL_VERSION,
        }
    }

    /// Working directory both bootstrap and launcher operate in.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Command-line arguments forwarded to the launcher.
    ///
    /// The launcher learns the working directory, which bootstrap
    /// protocol produced it, and the proxy settings the bootstrap
    /// itself used; anything the user put after `--` rides along
    /// unchanged at the end.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--workDir".to_string(),
            self.work_dir.display().to_string(),
            "--bootstrapVersion".to_string(),
            self.protocol_version.to_string(),
        ];
        if let Some(host) = self.proxy.host() {
            args.push("--proxyHost".to_string());
            args.push(host.to_string());
            args.push("--proxyPort".to_string());
            args.push(self.proxy.port().to_string());
            if let Some(credentials) = self.proxy.credentials() {
                args.push("--proxyUser".to_string());
                args.push(credentials.user().to_string());
                args.push("--proxyPass".to_string());
                args.push(credentials.pass().to_string());
            }
        }
        args.extend(self.passthrough.iter().cloned());
        args
    }
}

/// Starts the installed artifact.
pub trait ArtifactLauncher: Send + Sync {
    /// Launch `artifact` with the given context.
    fn launch(&self, artifact: &Path, context: &LaunchContext) -> Result<()>;
}

/// Launches the artifact as a child process with inherited stdio.
///
/// The bootstrap stays alive until the launcher exits so that whoever
/// started `gantry` from a terminal keeps a foreground process to
/// watch; the launcher's own exit code is logged rather than
/// propagated, since by then it is reporting its own errors.
pub struct ProcessLauncher;

impl ArtifactLauncher for ProcessLauncher {
    fn launch(&self, artifact: &Path, context: &LaunchContext) -> Result<()> {
        let args = context.to_args();
        debug!("spawning {} with args {:?}", artifact.display(), args);

        let status = Command::new(artifact)
            .args(args)
            .current_dir(context.work_dir())
            .status()
            .map_err(|error| BootstrapError::LaunchFailed {
                reason: error.to_string(),
            })?;

        if !status.success() {
            warn!("launcher exited with {status}");
        }
        Ok(())
    }
}
