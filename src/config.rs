//! Proxy configuration for all outbound connections.
//!
//! The bootstrap routes every request (digest probe, artifact download)
//! through one [`ProxyConfig`], assembled once from the command line and
//! passed by value to the components that open connections. The same
//! configuration is replayed to the launcher on hand-off so the child
//! process sees the network the same way the bootstrap did.

use anyhow::{Context, Result};

/// Credentials for an authenticated SOCKS proxy.
///
/// Only constructed when both user and password are non-empty; a bare
/// host/port proxy carries no credentials at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCredentials {
    user: String,
    pass: String,
}

impl ProxyCredentials {
    /// Build credentials from optional CLI values.
    ///
    /// Returns `None` unless both values are present and non-empty,
    /// so a stray `--proxyUser` without a password never produces a
    /// half-configured authenticator.
    #[must_use]
    pub fn from_parts(user: Option<&str>, pass: Option<&str>) -> Option<Self> {
        match (user, pass) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some(Self {
                user: user.to_string(),
                pass: pass.to_string(),
            }),
            _ => None,
        }
    }

    /// The proxy username.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// The proxy password.
    #[must_use]
    pub fn pass(&self) -> &str {
        &self.pass
    }
}

/// SOCKS proxy settings shared by every outbound connection.
///
/// The default configuration is "no proxy"; connections go out
/// directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    host: Option<String>,
    port: u16,
    credentials: Option<ProxyCredentials>,
}

impl ProxyConfig {
    /// Direct connections, no proxy.
    #[must_use]
    pub fn direct() -> Self {
        Self::default()
    }

    /// Proxy all connections through a SOCKS server.
    #[must_use]
    pub fn socks(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port,
            credentials: None,
        }
    }

    /// Attach credentials to a proxied configuration.
    ///
    /// Ignored (dropped with a debug log) when no host is configured,
    /// matching how the CLI surfaces behave: credentials without a host
    /// are meaningless.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<ProxyCredentials>) -> Self {
        if self.host.is_some() {
            self.credentials = credentials;
        } else if credentials.is_some() {
            tracing::debug!("ignoring proxy credentials: no proxy host configured");
        }
        self
    }

    /// Whether a proxy host is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.host.is_some()
    }

    /// The configured proxy host, if any.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// The configured proxy port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The configured credentials, if any.
    #[must_use]
    pub fn credentials(&self) -> Option<&ProxyCredentials> {
        self.credentials.as_ref()
    }

    /// Build the `reqwest` proxy for this configuration.
    ///
    /// Returns `Ok(None)` for direct connections.
    pub fn to_reqwest_proxy(&self) -> Result<Option<reqwest::Proxy>> {
        let Some(host) = &self.host else {
            return Ok(None);
        };

        let url = format!("socks5://{host}:{}", self.port);
        let mut proxy = reqwest::Proxy::all(&url)
            .with_context(|| format!("Invalid proxy address: {url}"))?;
        if let Some(credentials) = &self.credentials {
            proxy = proxy.basic_auth(credentials.user(), credentials.pass());
        }

        Ok(Some(proxy))
    }
}
