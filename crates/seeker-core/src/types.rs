//! Shared types used across the Seeker engine.
//!
//! This module defines common newtypes and domain records that provide
//! type safety and clear modeling of one scan's data.

use crate::error::SeekerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum accepted username length in characters.
pub const MAX_USERNAME_LEN: usize = 64;

/// Newtype for the handle being scanned, validated at construction.
///
/// Usernames are trimmed, must be non-empty, and must not exceed
/// [`MAX_USERNAME_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Username(String);

impl Username {
    /// Create a new `Username` from a string.
    ///
    /// # Errors
    /// Returns error if the trimmed value is empty or longer than
    /// [`MAX_USERNAME_LEN`] characters.
    pub fn new(raw: impl Into<String>) -> Result<Self, SeekerError> {
        let raw = raw.into();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(SeekerError::Validation("username required".to_string()));
        }

        let chars = trimmed.chars().count();
        if chars > MAX_USERNAME_LEN {
            return Err(SeekerError::Validation(format!(
                "username too long: {chars} characters (max {MAX_USERNAME_LEN})"
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for job identifiers.
///
/// Job ids are opaque and process-unique; UUID v4 under the hood.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Create a new random `JobId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an existing id string (e.g. from an API path segment).
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal classification of one (username, provider) probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// Positive evidence the handle exists on the provider
    Found,
    /// Positive evidence the handle does not exist
    NotFound,
    /// 2xx response without evidence either way
    Unknown,
    /// The provider refused the probe (rate limit, CAPTCHA, interstitial)
    Blocked,
    /// Transport or driver failure
    Error,
}

impl ResultStatus {
    /// Stable wire string for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::NotFound => "not_found",
            Self::Unknown => "unknown",
            Self::Blocked => "blocked",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of comparing one avatar against the reference face set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceMatch {
    /// Whether the best distance cleared the match threshold
    pub matched: bool,
    /// Minimum Euclidean distance to any reference descriptor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    /// Refusal reason when no comparison was possible
    /// (`no_face`, `download_failed`, `onion_host`, `unsupported_format`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Extracted profile bag for one probe.
///
/// All fields are optional; providers fill what they can and the addon
/// pipeline appends its keys after the scan phase. Serialization skips
/// empty fields so the wire shape stays compact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Display name from the page or API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Avatar image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Free-text bio / description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Canonical profile URL as declared by the page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    /// Follower count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followers: Option<u64>,
    /// Following count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub following: Option<u64>,
    /// Subscriber count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribers: Option<u64>,
    /// Account creation timestamp (RFC3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    // --- appended by the addon pipeline ---
    /// URLs found in the bio text
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bio_urls: Vec<String>,
    /// Lowercased domains derived from bio URLs and bare hostnames
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bio_domains: Vec<String>,
    /// `@handle` tokens found in the bio text
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bio_handles: Vec<String>,
    /// SHA-256 of the raw avatar bytes, hex
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_sha256: Option<String>,
    /// 64-bit difference hash of the decoded avatar, hex
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_dhash: Option<String>,
    /// Content-Type the avatar was served with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_content_type: Option<String>,
    /// Raw avatar size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_bytes: Option<u64>,
    /// Short reason the avatar could not be fetched or decoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_fetch_error: Option<String>,
    /// Cluster id shared by results with matching avatar fingerprints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_cluster_id: Option<u32>,
    /// Face comparison outcome, when reference images were supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_match: Option<FaceMatch>,
    /// Set when the face engine itself was unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_match_error: Option<String>,
}

impl Profile {
    /// True when no field carries a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Union `other` into `self` without overwriting non-empty values.
    ///
    /// Later extraction sources (OpenGraph after JSON-LD, Twitter-Card
    /// after OpenGraph) only fill gaps.
    pub fn merge_missing(&mut self, other: Profile) {
        fn fill<T>(dst: &mut Option<T>, src: Option<T>) {
            if dst.is_none() {
                *dst = src;
            }
        }

        fill(&mut self.display_name, other.display_name);
        fill(&mut self.avatar_url, other.avatar_url);
        fill(&mut self.bio, other.bio);
        fill(&mut self.canonical_url, other.canonical_url);
        fill(&mut self.followers, other.followers);
        fill(&mut self.following, other.following);
        fill(&mut self.subscribers, other.subscribers);
        fill(&mut self.created_at, other.created_at);
    }
}

/// Terminal record for one (username, provider) probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResult {
    /// Provider name as registered
    pub provider: String,
    /// The scanned handle
    pub username: String,
    /// Requested URL (the canonical profile URL for code drivers)
    pub url: String,
    /// Classification outcome
    pub status: ResultStatus,
    /// HTTP status of the final response, when one was received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Wall-clock duration of the probe in milliseconds
    pub elapsed_ms: u64,
    /// Short human-readable failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Extracted profile fields
    pub profile: Profile,
    /// When the probe completed
    pub timestamp: DateTime<Utc>,
}

impl ProviderResult {
    /// Build a probe record in `error` state with a short message.
    #[must_use]
    pub fn error(
        provider: impl Into<String>,
        username: impl Into<String>,
        url: impl Into<String>,
        elapsed_ms: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            username: username.into(),
            url: url.into(),
            status: ResultStatus::Error,
            http_status: None,
            elapsed_ms,
            error: Some(message.into()),
            profile: Profile::default(),
            timestamp: Utc::now(),
        }
    }
}
