//! Error handling for gantry.
//!
//! This module provides the strongly-typed error enum for every fatal
//! failure mode of the bootstrap, plus the fatal report shown to users
//! when the process aborts.
//!
//! # Error Categories
//!
//! Bootstrap errors fall into a small number of categories:
//! - **Configuration**: [`BootstrapError::InvalidWorkDir`],
//!   [`BootstrapError::WorkDirCreateFailed`] - the working directory is
//!   unusable before any network activity starts
//! - **Install**: [`BootstrapError::TargetNotWritable`],
//!   [`BootstrapError::TargetDeleteFailed`],
//!   [`BootstrapError::InstallCopyFailed`] - the downloaded artifact
//!   cannot be moved into place
//! - **Download**: [`BootstrapError::ForcedDownloadFailed`] - a download
//!   that had to succeed (forced refresh, or no artifact on disk) did not
//! - **Launch**: [`BootstrapError::LaunchFailed`] - the artifact would
//!   not start
//!
//! Transient conditions (retryable HTTP statuses, connection errors,
//! integrity mismatches) deliberately have no variants here: they live
//! and die inside the downloader's attempt loop and are reported through
//! the log sink, not through the error chain.
//!
//! # Examples
//!
//! ```rust,no_run
//! use gantry_cli::core::BootstrapError;
//!
//! fn promote() -> Result<(), BootstrapError> {
//!     Err(BootstrapError::TargetNotWritable {
//!         path: "/opt/launcher".to_string(),
//!     })
//! }
//!
//! if let Err(e) = promote() {
//!     eprintln!("{e}");
//! }
//! ```

use colored::Colorize;
use std::backtrace::Backtrace;
use thiserror::Error;

use crate::constants::PROTOCOL_VERSION;

/// The main error type for fatal bootstrap failures.
///
/// Every variant carries enough context to print a useful fatal report
/// without chasing the error chain. Transient download problems are not
/// represented here; they are consumed by the retry loop.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// The configured working directory exists but is not a directory.
    #[error("Invalid working directory: {path}")]
    InvalidWorkDir {
        /// The offending path
        path: String,
    },

    /// The working directory did not exist and could not be created.
    #[error("Unable to create directory: {path}")]
    WorkDirCreateFailed {
        /// The path that could not be created
        path: String,
        /// The underlying filesystem error
        #[source]
        source: std::io::Error,
    },

    /// The installed artifact exists but cannot be written, so the
    /// pending artifact can never replace it.
    #[error("Unable to write to {path}")]
    TargetNotWritable {
        /// Path of the read-only artifact
        path: String,
    },

    /// Something that is not a regular file occupies the artifact path
    /// and could not be deleted.
    #[error("Unable to delete {path}")]
    TargetDeleteFailed {
        /// Path of the undeletable entry
        path: String,
        /// The underlying filesystem error
        #[source]
        source: std::io::Error,
    },

    /// The rename fallback (copy across filesystems) failed, leaving the
    /// pending artifact uninstalled.
    #[error("Unable to copy {from} to {to}")]
    InstallCopyFailed {
        /// Source of the failed copy
        from: String,
        /// Destination of the failed copy
        to: String,
        /// The underlying filesystem error
        #[source]
        source: std::io::Error,
    },

    /// A download that was required to succeed (forced refresh or no
    /// artifact on disk) ended without a downloaded artifact.
    #[error("Unable to download while being forced")]
    ForcedDownloadFailed,

    /// The launcher artifact could not be started.
    #[error("Unable to start launcher: {reason}")]
    LaunchFailed {
        /// Why the launch failed (typically the spawn error)
        reason: String,
    },
}

/// Build the fatal report printed when the bootstrap aborts.
///
/// Mirrors what users see when everything else has already gone wrong:
/// the error chain, a backtrace, everything the bootstrap printed up to
/// this point, and a version tag so bug reports identify the build.
///
/// The caller is expected to print the result to stderr and exit
/// non-zero.
#[must_use]
pub fn fatal_report(error: &anyhow::Error, transcript: &str) -> String {
    let mut report = String::new();

    report.push_str(&format!("{} {error:#}\n", "FATAL ERROR:".red().bold()));
    report.push_str(&format!("{}\n", Backtrace::force_capture()));
    report.push('\n');
    report.push_str(transcript);
    if !transcript.ends_with('\n') && !transcript.is_empty() {
        report.push('\n');
    }
    report.push_str(&format!(
        "\n{} version: {} (protocol {PROTOCOL_VERSION})\n",
        crate::constants::APP_NAME,
        env!("CARGO_PKG_VERSION")
    ));
    report.push_str("Please fix the error and restart.\n");

    report
}
