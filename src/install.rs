//! Promotion of a downloaded artifact into its canonical place.
//!
//! Downloads land at a pending path next to the canonical artifact;
//! promotion is the rename that makes the new build the one that gets
//! launched. Rename is atomic on the same filesystem, so a crash leaves
//! either the old artifact or the new one, never a torn file. When
//! rename fails (typically a cross-filesystem working directory) a
//! copy-and-delete fallback runs instead, accepting the weaker
//! guarantee.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};

use crate::core::BootstrapError;
use crate::sink::LogSink;

/// Moves the pending artifact over the canonical one.
pub struct Installer {
    pending: PathBuf,
    canonical: PathBuf,
    sink: Arc<dyn LogSink>,
}

impl Installer {
    /// Create an installer for the given path pair.
    pub fn new(pending: PathBuf, canonical: PathBuf, sink: Arc<dyn LogSink>) -> Self {
        Self {
            pending,
            canonical,
            sink,
        }
    }

    /// Promote the pending artifact, if there is one.
    ///
    /// Steps, in order:
    ///
    /// 1. anything at the canonical path that is not a regular file is
    ///    deleted; failure to delete is fatal
    /// 2. if no pending file exists this is a no-op (callers invoke
    ///    promote unconditionally, including after failed downloads)
    /// 3. rename pending over canonical
    /// 4. on rename failure: a canonical file that exists but is not
    ///    writable is fatal; otherwise fall back to copy-and-delete,
    ///    where a copy failure is fatal but a failure to delete the
    ///    leftover pending file is only logged
    ///
    /// After a successful install the artifact is marked executable on
    /// Unix; downloaded files arrive without the execute bit.
    pub async fn promote(&self) -> Result<()> {
        if let Ok(metadata) = fs::metadata(&self.canonical).await
            && !metadata.is_file()
        {
            self.remove_occupying_entry(metadata.is_dir()).await?;
        }

        let pending_is_file =
            fs::metadata(&self.pending).await.map(|metadata| metadata.is_file()).unwrap_or(false);
        if !pending_is_file {
            debug!("no pending artifact at {}", self.pending.display());
            return Ok(());
        }

        self.sink.write_line(&format!(
            "Renaming {} to {}",
            self.pending.display(),
            self.canonical.display()
        ));

        match fs::rename(&self.pending, &self.canonical).await {
            Ok(()) => self.sink.write_line("Renamed successfully."),
            Err(rename_error) => {
                debug!("rename failed: {rename_error}");
                if let Ok(metadata) = fs::metadata(&self.canonical).await
                    && metadata.permissions().readonly()
                {
                    return Err(BootstrapError::TargetNotWritable {
                        path: self.canonical.display().to_string(),
                    }
                    .into());
                }
                self.sink.write_line(
                    "Unable to rename - could be on another filesystem, trying copy & delete.",
                );
                self.copy_and_delete().await?;
            }
        }

        self.mark_executable().await;
        Ok(())
    }

    /// Delete whatever non-file entry occupies the canonical path.
    ///
    /// Directories are removed non-recursively: a populated directory
    /// sitting where the artifact belongs is surprising enough that
    /// refusing (and failing the bootstrap) beats silently destroying
    /// its contents.
    async fn remove_occupying_entry(&self, is_dir: bool) -> Result<()> {
        debug!("removing non-file entry at {}", self.canonical.display());
        let result = if is_dir {
            fs::remove_dir(&self.canonical).await
        } else {
            fs::remove_file(&self.canonical).await
        };
        result.map_err(|source| {
            BootstrapError::TargetDeleteFailed {
                path: self.canonical.display().to_string(),
                source,
            }
            .into()
        })
    }

    async fn copy_and_delete(&self) -> Result<()> {
        let pending_is_file =
            fs::metadata(&self.pending).await.map(|metadata| metadata.is_file()).unwrap_or(false);
        if !pending_is_file {
            // The detached download task or another process beat us here.
            self.sink.write_line("Nevermind... file vanished?");
            return Ok(());
        }

        fs::copy(&self.pending, &self.canonical).await.map_err(|source| {
            BootstrapError::InstallCopyFailed {
                from: self.pending.display().to_string(),
                to: self.canonical.display().to_string(),
                source,
            }
        })?;

        match fs::remove_file(&self.pending).await {
            Ok(()) => self.sink.write_line("Copy & delete succeeded."),
            Err(error) => {
                warn!("could not remove pending artifact after copy: {error}");
                self.sink
                    .write_line(&format!("Unable to remove {} after copy.", self.pending.display()));
            }
        }
        Ok(())
    }

    /// Ensure the installed artifact is executable.
    ///
    /// Best effort: if permissions cannot be set the subsequent launch
    /// fails with a clearer error of its own.
    #[cfg(unix)]
    async fn mark_executable(&self) {
        use std::os::unix::fs::PermissionsExt;

        let Ok(metadata) = fs::metadata(&self.canonical).await else {
            return;
        };
        let mut permissions = metadata.permissions();
        if permissions.mode() & 0o111 == 0 {
            permissions.set_mode(permissions.mode() | 0o755);
            if let Err(error) = fs::set_permissions(&self.canonical, permissions).await {
                warn!("could not mark {} executable: {error}", self.canonical.display());
            }
        }
    }

    #[cfg(not(unix))]
    async fn mark_executable(&self) {}

    /// The canonical artifact path this installer targets.
    #[must_use]
    pub fn canonical(&self) -> &Path {
        &self.canonical
    }
}
