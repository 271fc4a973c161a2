//! Error types for the scan subsystem.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while issuing probes.
///
/// These stay confined to the probe that raised them; the engine maps
/// them into `status = error` results instead of failing the job.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Rate-control permits were not available before the deadline
    #[error("timeout acquiring rate permit for {host} after {deadline:?}")]
    AcquireTimeout {
        /// Host the permit was requested for
        host: String,
        /// Deadline that elapsed
        deadline: Duration,
    },

    /// Request URL could not be parsed
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// URL had no host component
    #[error("url has no host: {url}")]
    MissingHost {
        /// The offending URL
        url: String,
    },

    /// `.onion` host requested but no SOCKS proxy is configured
    #[error("onion host {host} requires a SOCKS proxy")]
    OnionWithoutProxy {
        /// The onion host
        host: String,
    },

    /// Transport failure (DNS, TCP, TLS, read timeout)
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The probe was cancelled cooperatively
    #[error("cancelled")]
    Cancelled,
}

impl ScanError {
    /// Short human string for result records.
    #[must_use]
    pub fn short_message(&self) -> String {
        match self {
            Self::AcquireTimeout { .. } => "timeout".to_string(),
            Self::Cancelled => "cancelled".to_string(),
            Self::Http(e) if e.is_timeout() => "timeout".to_string(),
            Self::Http(e) if e.is_connect() => "connect failed".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type for scan operations.
pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_messages() {
        let err = ScanError::AcquireTimeout {
            host: "example.test".to_string(),
            deadline: Duration::from_secs(90),
        };
        assert_eq!(err.short_message(), "timeout");
        assert_eq!(ScanError::Cancelled.short_message(), "cancelled");
    }
}
