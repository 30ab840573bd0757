//! Working-directory resolution and validation.
//!
//! The bootstrap keeps the launcher artifact in a per-user state
//! directory unless `--workDir` overrides it. Resolution follows
//! platform conventions; validation happens before any network
//! activity, because an unusable working directory is fatal.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::constants::APP_NAME;
use crate::core::BootstrapError;

/// Resolve the default working directory for the current platform.
///
/// - **macOS**: `~/Library/Application Support/gantry`
/// - **Windows**: `%APPDATA%\gantry`
/// - **other Unix**: `~/.gantry`
pub fn default_work_dir() -> Result<PathBuf> {
    #[cfg(any(target_os = "macos", windows))]
    {
        dirs::data_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or_else(|| anyhow::anyhow!("Could not determine application data directory"))
    }

    #[cfg(not(any(target_os = "macos", windows)))]
    {
        dirs::home_dir().map(|home| home.join(format!(".{APP_NAME}"))).ok_or_else(|| {
            anyhow::anyhow!(
                "Could not determine home directory.\n\nCheck that the HOME environment variable is set"
            )
        })
    }
}

/// Validate the working directory, creating it when absent, and return
/// its canonical form.
///
/// A path that exists but is not a directory, or a path that cannot be
/// created, aborts the bootstrap before it touches the network.
///
/// The returned path is absolute. The launcher is spawned with its
/// working directory changed, so a relative `--workDir` must be pinned
/// down here, before any artifact path is derived from it.
pub async fn ensure_work_dir(path: &Path) -> Result<PathBuf> {
    match fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => {
            debug!("Using working directory: {}", path.display());
        }
        Ok(_) => {
            return Err(BootstrapError::InvalidWorkDir {
                path: path.display().to_string(),
            }
            .into());
        }
        Err(_) => {
            debug!("Creating working directory: {}", path.display());
            fs::create_dir_all(path).await.map_err(|source| {
                BootstrapError::WorkDirCreateFailed {
                    path: path.display().to_string(),
                    source,
                }
            })?;
        }
    }

    fs::canonicalize(path)
        .await
        .with_context(|| format!("Failed to resolve working directory: {}", path.display()))
}
