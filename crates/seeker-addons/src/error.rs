//! Error types for the addon pipeline.

use thiserror::Error;

/// Errors raised by addon fetches and helpers.
///
/// These never escape the pipeline as failures; addons fold them into
/// per-result error fields.
#[derive(Debug, Error)]
pub enum AddonError {
    /// URL failed the SSRF guard
    #[error("unsafe url: {0}")]
    UnsafeUrl(String),

    /// Response exceeded the byte cap
    #[error("content too large (limit {limit} bytes)")]
    TooLarge {
        /// The enforced cap
        limit: u64,
    },

    /// Content-Type outside the accepted set
    #[error("unexpected content-type: {0}")]
    UnsupportedContentType(String),

    /// Image bytes could not be decoded
    #[error("image decode failed: {0}")]
    Decode(String),

    /// Transport failure
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response
    #[error("bad status: {0}")]
    BadStatus(u16),

    /// Too many redirect hops
    #[error("too many redirects")]
    TooManyRedirects,

    /// The external service is unreachable or answered with an
    /// unexpected shape
    #[error("service unavailable")]
    Unavailable,
}

impl AddonError {
    /// Short string for per-result error fields.
    #[must_use]
    pub fn short_message(&self) -> String {
        match self {
            Self::UnsafeUrl(reason) => reason.clone(),
            Self::TooLarge { .. } => "too large".to_string(),
            Self::UnsupportedContentType(_) => "unsupported_format".to_string(),
            Self::Decode(_) => "unsupported_format".to_string(),
            Self::Http(e) if e.is_timeout() => "timeout".to_string(),
            Self::Http(_) => "download_failed".to_string(),
            Self::BadStatus(_) => "download_failed".to_string(),
            Self::TooManyRedirects => "download_failed".to_string(),
            Self::Unavailable => "engine_unavailable".to_string(),
        }
    }
}

/// Result type for addon operations.
pub type Result<T> = std::result::Result<T, AddonError>;
