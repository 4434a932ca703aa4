//! Multi-hop page-scraping helpers
//!
//! Chained discovery walks document page → redirect page → viewer page →
//! embedded config, extracting one required token per hop. Each hop is a
//! typed step: a fetch plus a pattern extraction that fails with the hop's
//! name, so discovery errors are attributable to the exact hop that broke.

use regex::Regex;

use crate::http::AsyncHttpClient;

use super::types::DiscoveryError;

/// Fetches a page body as text for scraping.
///
/// Bodies are decoded lossily; discovery patterns only target ASCII
/// fragments (URLs, attribute values) so replacement characters are
/// harmless.
pub async fn fetch_page<C: AsyncHttpClient>(
    client: &C,
    url: &str,
) -> Result<String, DiscoveryError> {
    let bytes = client.get(url).await.map_err(|e| DiscoveryError::Fetch {
        url: url.to_string(),
        source: e,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Extracts one required token from a page body.
///
/// Returns capture group 1 when the pattern has one, otherwise the whole
/// match. A non-matching pattern is a hard failure naming the hop — no hop
/// in a discovery chain is optional.
pub fn extract_token(
    hop: &'static str,
    url: &str,
    body: &str,
    pattern: &Regex,
) -> Result<String, DiscoveryError> {
    pattern
        .captures(body)
        .and_then(|captures| {
            captures
                .get(1)
                .or_else(|| captures.get(0))
                .map(|m| m.as_str().to_string())
        })
        .ok_or_else(|| DiscoveryError::MissingToken {
            hop,
            url: url.to_string(),
        })
}

/// Derives `scheme://host/` from a URL, the usual referrer shape for
/// viewer-gated tile servers.
pub fn origin_of(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let host = rest.split(['/', '?', '#']).next()?;
    if host.is_empty() {
        return None;
    }
    Some(format!("{}://{}/", scheme, host))
}
