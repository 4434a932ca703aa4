//! Tile request authentication

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Authentication configuration for tile requests.
///
/// Discriminated by variant; each variant carries only the fields relevant
/// to its scheme. Rendered to concrete HTTP headers with
/// [`TileAuthConfig::header_pairs`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TileAuthConfig {
    /// No authentication required.
    #[default]
    None,

    /// Referrer-gated tiles, optionally with extra browser-like headers.
    Referrer {
        referrer: String,
        extra_headers: Vec<(String, String)>,
    },

    /// Session cookies.
    Cookies { cookies: Vec<(String, String)> },

    /// OAuth-style bearer token.
    Bearer { token: String },

    /// HTTP Basic credentials.
    Basic { username: String, password: String },

    /// Arbitrary custom headers.
    Custom { headers: Vec<(String, String)> },
}

impl TileAuthConfig {
    /// Scheme name for logging and result metadata.
    pub fn scheme(&self) -> &'static str {
        match self {
            TileAuthConfig::None => "none",
            TileAuthConfig::Referrer { .. } => "referrer",
            TileAuthConfig::Cookies { .. } => "cookies",
            TileAuthConfig::Bearer { .. } => "bearer",
            TileAuthConfig::Basic { .. } => "basic",
            TileAuthConfig::Custom { .. } => "custom",
        }
    }

    /// Renders this configuration to HTTP header name/value pairs.
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        match self {
            TileAuthConfig::None => Vec::new(),
            TileAuthConfig::Referrer {
                referrer,
                extra_headers,
            } => {
                let mut headers = vec![("Referer".to_string(), referrer.clone())];
                headers.extend(extra_headers.iter().cloned());
                headers
            }
            TileAuthConfig::Cookies { cookies } => {
                let rendered = cookies
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect::<Vec<_>>()
                    .join("; ");
                vec![("Cookie".to_string(), rendered)]
            }
            TileAuthConfig::Bearer { token } => {
                vec![("Authorization".to_string(), format!("Bearer {}", token))]
            }
            TileAuthConfig::Basic { username, password } => {
                let credentials = BASE64.encode(format!("{}:{}", username, password));
                vec![("Authorization".to_string(), format!("Basic {}", credentials))]
            }
            TileAuthConfig::Custom { headers } => headers.clone(),
        }
    }
}
