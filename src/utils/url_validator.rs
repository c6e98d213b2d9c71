// SPDX-License-Identifier: GPL-3.0-only
use url::Url;
use anyhow::{Result, Context};

/// Maximum allowed URL length
const MAX_URL_LENGTH: usize = 2048;

/// Protocols a feed or proxy may be reached over
pub const ACCEPTED_SCHEMES: &[&str] = &["http", "https", "ftp", "file"];

/// Validate a feed (or proxy) URL
///
/// Checks:
/// - Validates URL length
/// - Only allows the protocols in `ACCEPTED_SCHEMES`
/// - Requires a host for every protocol except `file`
///
/// Local and private hosts are allowed: mirrors on the same network are the
/// common case for repository feeds.
pub fn validate_feed_url(url_str: &str) -> Result<Url> {
    // Check URL length
    if url_str.len() > MAX_URL_LENGTH {
        return Err(anyhow::anyhow!("URL exceeds maximum length of {} characters", MAX_URL_LENGTH));
    }

    // Parse URL
    let url = Url::parse(url_str)
        .context("Invalid URL format")?;

    // Check scheme
    if !ACCEPTED_SCHEMES.contains(&url.scheme()) {
        return Err(anyhow::anyhow!(
            "Invalid URL scheme: {} (allowed: {})",
            url.scheme(),
            ACCEPTED_SCHEMES.join(", ")
        ));
    }

    // Check host
    if url.scheme() != "file" && url.host_str().map_or(true, str::is_empty) {
        return Err(anyhow::anyhow!("URL must have a host"));
    }

    Ok(url)
}
