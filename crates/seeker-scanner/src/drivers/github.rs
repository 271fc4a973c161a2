//! GitHub driver backed by the public REST API.
//!
//! `GET https://api.github.com/users/{username}` returns avatar,
//! follower counts, bio, and the account creation date for public
//! profiles, which is far richer than scraping the HTML page.

use crate::client::JSON_BODY_CAP;
use crate::probe::{elapsed_ms, ProbeContext, Prober};
use async_trait::async_trait;
use chrono::Utc;
use seeker_core::{Profile, ProviderResult, ResultStatus, Username};
use seeker_registry::{ua_profile, UaProfile};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use url::Url;

const API_BASE: &str = "https://api.github.com/users";

/// Metadata-rich GitHub prober.
pub struct GitHubProber {
    api_base: String,
    ua: &'static UaProfile,
}

impl Default for GitHubProber {
    fn default() -> Self {
        Self::new()
    }
}

impl GitHubProber {
    /// Create the prober against the public API.
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_base: API_BASE.to_string(),
            ua: ua_profile("desktop_chrome").expect("known ua profile"),
        }
    }

    /// Point the prober at a different API base (tests).
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn profile_url(username: &Username) -> String {
        format!("https://github.com/{}", username.as_str())
    }
}

#[async_trait]
impl Prober for GitHubProber {
    fn name(&self) -> &str {
        "github"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn check(&self, ctx: &ProbeContext, username: &Username) -> ProviderResult {
        let start = Instant::now();
        let profile_url = Self::profile_url(username);
        let api_url = format!("{}/{}", self.api_base, username.as_str());

        let fail = |message: String, start: Instant| {
            ProviderResult::error(
                "github",
                username.as_str(),
                profile_url.clone(),
                elapsed_ms(start),
                message,
            )
        };

        let url = match Url::parse(&api_url) {
            Ok(url) => url,
            Err(e) => return fail(format!("invalid url: {e}"), start),
        };

        let _permit = match ctx.limiter.acquire(&url).await {
            Ok(permit) => permit,
            Err(e) => return fail(e.short_message(), start),
        };
        if ctx.cancel.is_cancelled() {
            return fail("cancelled".to_string(), start);
        }

        let mut headers = BTreeMap::new();
        headers.insert(
            "Accept".to_string(),
            "application/vnd.github+json".to_string(),
        );

        let page = match ctx
            .clients
            .fetch_page("GET", &url, self.ua, &headers, self.timeout(), JSON_BODY_CAP)
            .await
        {
            Ok(page) => page,
            Err(e) => return fail(e.short_message(), start),
        };

        // GitHub uses 404 for non-existent users, 403 for rate limiting.
        let status = match page.http_status {
            404 => ResultStatus::NotFound,
            403 | 429 => ResultStatus::Blocked,
            s if (200..300).contains(&s) => ResultStatus::Found,
            _ => ResultStatus::Unknown,
        };

        let profile = if status == ResultStatus::Found {
            serde_json::from_str::<serde_json::Value>(&page.body)
                .map(|data| Profile {
                    display_name: string_field(&data, "name")
                        .or_else(|| string_field(&data, "login")),
                    avatar_url: string_field(&data, "avatar_url"),
                    bio: string_field(&data, "bio"),
                    canonical_url: string_field(&data, "html_url"),
                    followers: data.get("followers").and_then(serde_json::Value::as_u64),
                    following: data.get("following").and_then(serde_json::Value::as_u64),
                    created_at: string_field(&data, "created_at"),
                    ..Profile::default()
                })
                .unwrap_or_default()
        } else {
            Profile::default()
        };

        ProviderResult {
            provider: "github".to_string(),
            username: username.as_str().to_string(),
            url: profile_url,
            status,
            http_status: Some(page.http_status),
            elapsed_ms: elapsed_ms(start),
            error: None,
            profile,
            timestamp: Utc::now(),
        }
    }
}

fn string_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
