//! Global constants used throughout the gantry codebase.
//!
//! This module contains the remote endpoints, timeout durations, retry
//! parameters, and other numeric constants that are used across multiple
//! modules. Defining them centrally improves maintainability and makes
//! magic numbers more discoverable.

use std::time::Duration;

/// Application name, used for the platform state directory (`~/.gantry` and
/// friends) and for user-facing output.
pub const APP_NAME: &str = "gantry";

/// Base URL under which launcher builds are published.
///
/// Artifacts live at `<base>/<os>-<arch>/<file>`, with the digest manifest
/// at the same URL plus a `.md5` suffix.
pub const ARTIFACT_BASE_URL: &str = "https://dl.gantry-project.org/launcher/latest";

/// Version of the hand-off contract between the bootstrap and the launcher.
///
/// Passed to the launcher on its command line so it can refuse bootstraps
/// that predate a contract change.
pub const PROTOCOL_VERSION: u32 = 5;

/// Maximum number of attempts the downloader makes before giving up.
///
/// Each attempt opens a fresh connection. Retryable conditions (4xx
/// responses, network errors, digest mismatches) consume attempts;
/// a definitive "no update" response stops the loop early.
pub const MAX_DOWNLOAD_ATTEMPTS: u32 = 10;

/// Timeout for establishing a connection (30 seconds).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for reads on an established connection (10 seconds).
///
/// Applies per read, not to the whole transfer, so a slow but live
/// download is never cut off.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the control task waits for the background download to report
/// whether an update exists (3 seconds).
///
/// If nothing is heard within this window the bootstrap launches the
/// existing artifact and leaves the download running detached.
pub const UPDATE_FOUND_WAIT: Duration = Duration::from_secs(3);

/// Buffer size for streaming digest computation (64 KiB).
pub const DIGEST_CHUNK_SIZE: usize = 64 * 1024;

/// Default SOCKS proxy port when `--proxyHost` is given without a port.
pub const DEFAULT_PROXY_PORT: u16 = 8080;

/// File name of the canonical launcher artifact inside the working
/// directory, with the platform executable suffix applied.
#[must_use]
pub fn launcher_file_name() -> String {
    format!("launcher{}", std::env::consts::EXE_SUFFIX)
}

/// File name of the pending (freshly downloaded, not yet installed)
/// launcher artifact.
#[must_use]
pub fn pending_file_name() -> String {
    format!("{}.new", launcher_file_name())
}

/// Download URL for the current platform's launcher build.
#[must_use]
pub fn download_url() -> String {
    format!(
        "{ARTIFACT_BASE_URL}/{}-{}/{}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        launcher_file_name()
    )
}

/// URL of the digest manifest for the current platform's launcher build.
///
/// The manifest body is one line: the 32-character lowercase hex MD5 of
/// the published artifact.
#[must_use]
pub fn digest_url() -> String {
    format!("{}.md5", download_url())
}
