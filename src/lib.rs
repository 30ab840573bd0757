//! gantry - self-updating launcher bootstrap
//!
//! Keeps a locally cached launcher executable in sync with the
//! remote-published build, downloading a fresh copy only when
//! necessary, and then hands control to it.
//!
//! # Update Protocol
//!
//! One bootstrap pass works through a fixed decision procedure:
//!
//! 1. An update downloaded by a previous run but never installed (a
//!    `.new` file next to the artifact) is promoted first.
//! 2. With `--force`, or when no artifact is installed yet, the
//!    download runs in the foreground and must succeed.
//! 3. Otherwise the local artifact's MD5 is compared against the
//!    published digest manifest. Equal digests skip the network
//!    entirely; differing digests start a background download that
//!    gets three seconds to confirm an update before the bootstrap
//!    launches the build it already has. A confirmed update is always
//!    waited for, however long the download takes.
//! 4. Whatever is current gets launched, with proxy settings and
//!    pass-through arguments forwarded on its command line.
//!
//! The background download is never cancelled. If the bootstrap moves
//! on before it finishes, the completed file is picked up as a cached
//! update on the next run.
//!
//! # Core Modules
//!
//! - [`bootstrap`] - the orchestrating state machine
//! - [`download`] - retrying artifact fetch with streaming integrity
//!   verification and the one-shot progress signals
//! - [`install`] - atomic promotion of a downloaded artifact, with a
//!   copy-and-delete fallback across filesystems
//! - [`checksum`] - streaming MD5 of local files
//! - [`manifest`] - the published-digest probe
//! - [`launch`] - hand-off to the launcher process
//!
//! ## Supporting Modules
//!
//! - [`cli`] - command-line surface
//! - [`config`] - proxy configuration value objects
//! - [`core`] - the fatal error taxonomy and diagnostic report
//! - [`http`] - shared HTTP client construction
//! - [`sink`] - user-visible log lines and the fatal-report transcript
//! - [`workdir`] - platform state directory resolution
//!
//! # Command-Line Usage
//!
//! ```bash
//! # Start the launcher, updating it first if a new build is published
//! gantry
//!
//! # Force a fresh download even when the local build looks current
//! gantry --force
//!
//! # Route update traffic through a SOCKS proxy
//! gantry --proxyHost proxy.example.com --proxyPort 1080
//!
//! # Forward arguments to the launcher
//! gantry -- --fullscreen
//! ```

// Orchestration
pub mod bootstrap;
pub mod cli;

// Update protocol
pub mod checksum;
pub mod download;
pub mod install;
pub mod manifest;

// Supporting modules
pub mod config;
pub mod constants;
pub mod core;
pub mod http;
pub mod launch;
pub mod sink;
pub mod workdir;
