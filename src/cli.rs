//! Command-line interface for the bootstrap binary.
//!
//! The surface is small: a force flag, proxy settings, an override for
//! the working directory, and a `--` separator after which everything
//! is forwarded verbatim to the launcher. Long flags are camelCase so
//! that existing wrapper scripts keep working across launcher
//! generations.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use crate::bootstrap::Bootstrap;
use crate::config::{ProxyConfig, ProxyCredentials};
use crate::constants::DEFAULT_PROXY_PORT;
use crate::sink::LogSink;
use crate::workdir;

/// Keeps the gantry launcher up to date and starts it.
#[derive(Parser, Debug)]
#[command(name = "gantry", version, about = "Keeps the gantry launcher up to date and starts it")]
pub struct Cli {
    /// Always download the latest launcher build before starting it.
    #[arg(long)]
    force: bool,

    /// SOCKS proxy host for update traffic.
    #[arg(long = "proxyHost", value_name = "HOST")]
    proxy_host: Option<String>,

    /// SOCKS proxy port.
    #[arg(long = "proxyPort", value_name = "PORT", default_value_t = DEFAULT_PROXY_PORT)]
    proxy_port: u16,

    /// Proxy username, used only together with --proxyPass.
    #[arg(long = "proxyUser", value_name = "USER")]
    proxy_user: Option<String>,

    /// Proxy password, used only together with --proxyUser.
    #[arg(long = "proxyPass", value_name = "PASS")]
    proxy_pass: Option<String>,

    /// Directory holding the launcher artifact. Defaults to the
    /// platform state directory.
    #[arg(long = "workDir", value_name = "DIR")]
    work_dir: Option<PathBuf>,

    /// Arguments after -- are forwarded verbatim to the launcher.
    #[arg(last = true, value_name = "ARGS")]
    passthrough: Vec<String>,
}

impl Cli {
    /// Resolve the parsed flags into a [`Bootstrap`] and run it.
    pub async fn execute(self, sink: Arc<dyn LogSink>) -> Result<()> {
        let work_dir = match self.work_dir {
            Some(dir) => dir,
            None => workdir::default_work_dir()?,
        };

        let credentials =
            ProxyCredentials::from_parts(self.proxy_user.as_deref(), self.proxy_pass.as_deref());
        let proxy = match self.proxy_host {
            Some(host) => ProxyConfig::socks(host, self.proxy_port).with_credentials(credentials),
            None => ProxyConfig::direct(),
        };

        Bootstrap::new(work_dir, proxy, self.passthrough, sink)
            .run(self.force)
            .await
    }
}
