//! Response classification.
//!
//! Turns an HTTP response into one of the five probe statuses using the
//! provider's pattern sets plus status-code heuristics. Transport
//! failures never reach this module; drivers map those to `error`
//! directly.

use seeker_core::ResultStatus;
use seeker_registry::Provider;

/// Body fingerprints of rate-limit walls and CAPTCHA interstitials.
///
/// This is the central list; providers extend it with their own
/// `blocked_patterns`.
pub const BLOCK_HINTS: &[&str] = &[
    "captcha",
    "verify you are human",
    "unusual traffic",
    "access denied",
    "temporarily blocked",
    "cloudflare",
    "security check",
    "please enable cookies",
    "just a moment",
];

/// Statuses that mean the provider refused the probe.
const BLOCKED_STATUSES: &[u16] = &[401, 402, 403, 429];

/// Statuses that mean the handle does not exist.
const NOT_FOUND_STATUSES: &[u16] = &[404, 410];

/// Patterns are evaluated against at most this much decoded body.
pub const CLASSIFY_BODY_CAP: usize = 512 * 1024;

/// Response facts the classifier consumes.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyInput<'a> {
    /// HTTP status of the final response
    pub http_status: u16,
    /// Decoded body
    pub body: &'a str,
    /// Whether a non-empty `og:title` was extracted
    pub og_title_present: bool,
    /// Whether any metadata source yielded a non-empty title
    pub metadata_title_present: bool,
}

/// Classify a response for one provider.
///
/// Decision order: blocked (status or pattern or interstitial hint),
/// then not-found (status or pattern), then found (2xx plus positive
/// evidence), then unknown. Deterministic for fixed inputs.
#[must_use]
pub fn classify(provider: &Provider, username: &str, input: ClassifyInput<'_>) -> ResultStatus {
    let body_lower = truncate_at_char_boundary(input.body, CLASSIFY_BODY_CAP).to_lowercase();

    if BLOCKED_STATUSES.contains(&input.http_status)
        || BLOCK_HINTS.iter().any(|h| body_lower.contains(h))
        || provider.blocked.matches(&body_lower, username)
    {
        return ResultStatus::Blocked;
    }

    if NOT_FOUND_STATUSES.contains(&input.http_status)
        || provider.error.matches(&body_lower, username)
    {
        return ResultStatus::NotFound;
    }

    if (200..300).contains(&input.http_status) {
        let positive = provider.success.matches(&body_lower, username)
            || input.og_title_present
            || (provider.metadata_presence && input.metadata_title_present);
        if positive {
            return ResultStatus::Found;
        }
    }

    ResultStatus::Unknown
}

/// Truncate a string to at most `max` bytes without splitting a char.
fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
