//! Shared HTTP plumbing for the probe and the downloader.
//!
//! Both network callers use the same client shape: fixed connect/read
//! timeouts, optional SOCKS proxying, no connection reuse so every
//! retry attempt opens a fresh connection, and a header set that forces
//! intermediaries not to serve cached responses. Update checks that hit
//! a stale cache would pin users to old launcher builds indefinitely.

use anyhow::{Context, Result};
use reqwest::header::{CACHE_CONTROL, EXPIRES, HeaderMap, HeaderValue, PRAGMA};

use crate::config::ProxyConfig;
use crate::constants::{CONNECT_TIMEOUT, READ_TIMEOUT};

/// Build the HTTP client used for all update traffic.
///
/// `pool_max_idle_per_host(0)` disables keep-alive reuse; each request
/// negotiates its own connection, which keeps retry attempts independent
/// of whatever broke the previous one.
pub fn build_client(proxy: &ProxyConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(READ_TIMEOUT)
        .pool_max_idle_per_host(0)
        .user_agent(concat!("gantry/", env!("CARGO_PKG_VERSION")));

    if let Some(proxy) = proxy.to_reqwest_proxy()? {
        builder = builder.proxy(proxy);
    }

    builder.build().context("Failed to build HTTP client")
}

/// Headers disabling caches along the request path.
///
/// Sent on every probe and download request. `Pragma` and `Expires` are
/// obsolete but still honored by proxies old enough to matter.
#[must_use]
pub fn no_cache_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store,max-age=0,no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static("0"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}
