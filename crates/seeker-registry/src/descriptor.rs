//! Provider descriptor types and pattern compilation.
//!
//! This module defines the serde model for YAML provider documents and
//! the compiled form the scan engine consumes. All match patterns are
//! compiled here, at load time, so invalid patterns surface as config
//! errors instead of scan-time failures.

use crate::error::{RegistryError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Placeholder expanded with the scanned handle in URL templates and
/// substring patterns.
pub const USERNAME_PLACEHOLDER: &str = "{username}";

/// UA profile applied when a descriptor doesn't name one.
pub const DEFAULT_UA_PROFILE: &str = "desktop_chrome";

/// Named bundle of User-Agent and accept-* headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UaProfile {
    /// Profile tag as referenced from descriptors
    pub name: &'static str,
    /// `User-Agent` header value
    pub user_agent: &'static str,
    /// `Accept` header value
    pub accept: &'static str,
    /// `Accept-Language` header value
    pub accept_language: &'static str,
}

/// Recognized UA profiles.
pub const UA_PROFILES: &[UaProfile] = &[
    UaProfile {
        name: "desktop_chrome",
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,\
                 image/webp,*/*;q=0.8",
        accept_language: "en-US,en;q=0.9",
    },
    UaProfile {
        name: "desktop_firefox",
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 \
                     Firefox/126.0",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        accept_language: "en-US,en;q=0.5",
    },
    UaProfile {
        name: "mobile_safari",
        user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) \
                     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 \
                     Safari/604.1",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        accept_language: "en-US,en;q=0.9",
    },
];

/// Look up a UA profile by tag.
#[must_use]
pub fn ua_profile(name: &str) -> Option<&'static UaProfile> {
    UA_PROFILES.iter().find(|p| p.name == name)
}

/// Raw provider descriptor as declared in YAML.
///
/// One YAML document is a map of provider name to this shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSpec {
    /// URL template containing `{username}` (required)
    pub url: String,
    /// Request timeout in seconds
    pub timeout: Option<u64>,
    /// UA profile tag; `desktop_chrome` when omitted
    pub ua_profile: Option<String>,
    /// Extra request headers
    pub headers: BTreeMap<String, String>,
    /// Body patterns implying the handle exists
    pub success_patterns: Vec<String>,
    /// Body patterns implying the handle does not exist
    pub error_patterns: Vec<String>,
    /// Body patterns implying the probe was refused
    pub blocked_patterns: Vec<String>,
    /// Treat this provider's patterns as regular expressions
    pub regex: bool,
    /// Sibling JSON endpoint template for the extractor
    pub json_endpoint: Option<String>,
    /// HTTP method, default GET
    pub method: Option<String>,
    /// Treat any non-empty extracted metadata title as proof of existence
    pub metadata_presence: bool,
}

/// One compiled match pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Case-insensitive substring; may contain `{username}`
    Substring(String),
    /// Compiled case-insensitive regex
    Regex(Regex),
}

impl Pattern {
    fn matches(&self, body_lower: &str, username_lower: &str) -> bool {
        match self {
            Self::Substring(needle) => {
                let needle = needle.replace(USERNAME_PLACEHOLDER, username_lower);
                body_lower.contains(&needle)
            }
            Self::Regex(re) => re.is_match(body_lower),
        }
    }
}

/// An ordered set of compiled patterns for one classification outcome.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Compile raw pattern strings.
    ///
    /// Substring patterns are lowercased up front. Regex patterns are
    /// compiled case-insensitively and must not contain the
    /// `{username}` placeholder (they are compiled once, at load).
    pub fn compile(raw: &[String], as_regex: bool) -> std::result::Result<Self, String> {
        let mut patterns = Vec::with_capacity(raw.len());

        for p in raw {
            if as_regex {
                if p.contains(USERNAME_PLACEHOLDER) {
                    return Err(format!(
                        "regex pattern may not contain {USERNAME_PLACEHOLDER}: {p:?}"
                    ));
                }
                let re = Regex::new(&format!("(?i){p}"))
                    .map_err(|e| format!("invalid regex {p:?}: {e}"))?;
                patterns.push(Pattern::Regex(re));
            } else {
                patterns.push(Pattern::Substring(p.to_lowercase()));
            }
        }

        Ok(Self { patterns })
    }

    /// True when any pattern matches the lowercased body.
    #[must_use]
    pub fn matches(&self, body_lower: &str, username: &str) -> bool {
        let username_lower = username.to_lowercase();
        self.patterns
            .iter()
            .any(|p| p.matches(body_lower, &username_lower))
    }

    /// Number of compiled patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True when the set holds no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Compiled provider descriptor ready for the scan engine.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Unique provider name
    pub name: String,
    /// URL template containing `{username}`
    pub url_template: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Resolved UA profile
    pub ua_profile: &'static UaProfile,
    /// Extra request headers
    pub headers: BTreeMap<String, String>,
    /// HTTP method (`GET` unless declared otherwise)
    pub method: String,
    /// Sibling JSON endpoint template for the extractor
    pub json_endpoint: Option<String>,
    /// Patterns implying existence
    pub success: PatternSet,
    /// Patterns implying absence
    pub error: PatternSet,
    /// Patterns implying refusal, merged with the central blocked hints
    pub blocked: PatternSet,
    /// Non-empty extracted metadata title implies existence
    pub metadata_presence: bool,
}

impl Provider {
    /// Compile a raw descriptor, validating as we go.
    ///
    /// # Errors
    /// Returns [`RegistryError::ValidationError`] when the URL template
    /// is missing the placeholder, the UA profile or method is unknown,
    /// or a pattern fails to compile.
    pub fn compile(name: &str, spec: &ProviderSpec) -> Result<Self> {
        if spec.url.trim().is_empty() {
            return Err(RegistryError::ValidationError {
                name: name.to_string(),
                reason: "url is required".to_string(),
            });
        }

        if !spec.url.contains(USERNAME_PLACEHOLDER) {
            return Err(RegistryError::ValidationError {
                name: name.to_string(),
                reason: format!("url template must contain {USERNAME_PLACEHOLDER}"),
            });
        }

        let ua_name = spec.ua_profile.as_deref().unwrap_or(DEFAULT_UA_PROFILE);
        let ua = ua_profile(ua_name).ok_or_else(|| RegistryError::ValidationError {
            name: name.to_string(),
            reason: format!("unknown ua_profile: {ua_name}"),
        })?;

        let method = spec
            .method
            .as_deref()
            .unwrap_or("GET")
            .to_ascii_uppercase();
        if !matches!(method.as_str(), "GET" | "HEAD" | "POST") {
            return Err(RegistryError::ValidationError {
                name: name.to_string(),
                reason: format!("unsupported method: {method}"),
            });
        }

        let compile_set = |raw: &[String]| {
            PatternSet::compile(raw, spec.regex).map_err(|reason| {
                RegistryError::ValidationError {
                    name: name.to_string(),
                    reason,
                }
            })
        };

        Ok(Self {
            name: name.to_string(),
            url_template: spec.url.clone(),
            timeout: Duration::from_secs(spec.timeout.unwrap_or(10)),
            ua_profile: ua,
            headers: spec.headers.clone(),
            method,
            json_endpoint: spec.json_endpoint.clone(),
            success: compile_set(&spec.success_patterns)?,
            error: compile_set(&spec.error_patterns)?,
            blocked: compile_set(&spec.blocked_patterns)?,
            metadata_presence: spec.metadata_presence,
        })
    }

    /// Expand the URL template for a handle.
    #[must_use]
    pub fn expand_url(&self, username: &str) -> String {
        self.url_template.replace(USERNAME_PLACEHOLDER, username)
    }

    /// Expand the JSON endpoint template for a handle, if declared.
    #[must_use]
    pub fn expand_json_endpoint(&self, username: &str) -> Option<String> {
        self.json_endpoint
            .as_ref()
            .map(|t| t.replace(USERNAME_PLACEHOLDER, username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(url: &str) -> ProviderSpec {
        ProviderSpec {
            url: url.to_string(),
            ..ProviderSpec::default()
        }
    }

    #[test]
    fn test_compile_minimal_descriptor() {
        let provider =
            Provider::compile("demo", &spec("https://example.test/u/{username}")).expect("compile");
        assert_eq!(provider.name, "demo");
        assert_eq!(provider.timeout, Duration::from_secs(10));
        assert_eq!(provider.ua_profile.name, "desktop_chrome");
        assert_eq!(provider.method, "GET");
        assert_eq!(
            provider.expand_url("alice"),
            "https://example.test/u/alice"
        );
    }

    #[test]
    fn test_compile_rejects_missing_placeholder() {
        let result = Provider::compile("demo", &spec("https://example.test/u/fixed"));
        assert!(matches!(
            result.unwrap_err(),
            RegistryError::ValidationError { .. }
        ));
    }

    #[test]
    fn test_compile_rejects_unknown_ua_profile() {
        let mut s = spec("https://example.test/u/{username}");
        s.ua_profile = Some("smart_fridge".to_string());
        assert!(Provider::compile("demo", &s).is_err());
    }

    #[test]
    fn test_compile_rejects_unknown_method() {
        let mut s = spec("https://example.test/u/{username}");
        s.method = Some("TRACE".to_string());
        assert!(Provider::compile("demo", &s).is_err());
    }

    #[test]
    fn test_substring_patterns_case_insensitive_with_placeholder() {
        let set = PatternSet::compile(
            &["Followers".to_string(), "@{username}".to_string()],
            false,
        )
        .expect("compile patterns");

        assert!(set.matches("12 followers on this page", "alice"));
        assert!(set.matches("profile of @alice here", "Alice"));
        assert!(!set.matches("nothing relevant", "alice"));
    }

    #[test]
    fn test_regex_patterns() {
        let set = PatternSet::compile(&[r"user[_-]?id:\s*\d+".to_string()], true)
            .expect("compile regex patterns");

        assert!(set.matches("found user_id: 4821 in body", "alice"));
        assert!(set.matches("FOUND USERID: 7 IN BODY".to_lowercase().as_str(), "alice"));
        assert!(!set.matches("user_id: none", "alice"));
    }

    #[test]
    fn test_regex_pattern_rejects_placeholder() {
        let err = PatternSet::compile(&["^{username}$".to_string()], true).unwrap_err();
        assert!(err.contains("{username}"));
    }

    #[test]
    fn test_invalid_regex_is_config_error() {
        let mut s = spec("https://example.test/u/{username}");
        s.regex = true;
        s.success_patterns = vec!["[unclosed".to_string()];
        assert!(Provider::compile("demo", &s).is_err());
    }

    #[test]
    fn test_ua_profiles_known_tags() {
        for tag in ["desktop_chrome", "desktop_firefox", "mobile_safari"] {
            assert!(ua_profile(tag).is_some(), "missing profile: {tag}");
        }
        assert!(ua_profile("unknown").is_none());
    }
}
