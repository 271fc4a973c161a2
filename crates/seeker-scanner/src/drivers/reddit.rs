//! Reddit driver backed by the `/user/{username}/about.json` endpoint.
//!
//! The about endpoint is a JSON view of public user info including
//! `created_utc` and avatar fields. Reddit is picky about User-Agent,
//! so the driver always sends a project UA string.

use crate::client::JSON_BODY_CAP;
use crate::probe::{elapsed_ms, ProbeContext, Prober};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use seeker_core::{Profile, ProviderResult, ResultStatus, Username};
use seeker_registry::{ua_profile, UaProfile};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use url::Url;

const API_BASE: &str = "https://www.reddit.com/user";
const PROJECT_UA: &str = "seeker/0.3 (OSINT research)";

/// Metadata-rich Reddit prober.
pub struct RedditProber {
    api_base: String,
    ua: &'static UaProfile,
}

impl Default for RedditProber {
    fn default() -> Self {
        Self::new()
    }
}

impl RedditProber {
    /// Create the prober against reddit.com.
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
        format!("https://www.reddit.com/user/{}", username.as_str())
    }
}

#[async_trait]
impl Prober for RedditProber {
    fn name(&self) -> &str {
        "reddit"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn check(&self, ctx: &ProbeContext, username: &Username) -> ProviderResult {
        let start = Instant::now();
        let profile_url = Self::profile_url(username);
        let api_url = format!("{}/{}/about.json", self.api_base, username.as_str());

        let fail = |message: String, start: Instant| {
            ProviderResult::error(
                "reddit",
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
        headers.insert("User-Agent".to_string(), PROJECT_UA.to_string());

        let page = match ctx
            .clients
            .fetch_page("GET", &url, self.ua, &headers, self.timeout(), JSON_BODY_CAP)
            .await
        {
            Ok(page) => page,
            Err(e) => return fail(e.short_message(), start),
        };

        let status = match page.http_status {
            404 => ResultStatus::NotFound,
            403 | 429 => ResultStatus::Blocked,
            s if (200..300).contains(&s) => ResultStatus::Found,
            _ => ResultStatus::Unknown,
        };

        let profile = if status == ResultStatus::Found {
            serde_json::from_str::<serde_json::Value>(&page.body)
                .ok()
                .and_then(|payload| payload.get("data").cloned())
                .map(|data| {
                    let created_at = data
                        .get("created_utc")
                        .and_then(serde_json::Value::as_f64)
                        .and_then(created_utc_to_rfc3339);

                    Profile {
                        display_name: data
                            .get("subreddit")
                            .and_then(|s| s.get("title"))
                            .and_then(serde_json::Value::as_str)
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string)
                            .or_else(|| Some(username.as_str().to_string())),
                        avatar_url: first_string(&data, &["icon_img", "snoovatar_img"]),
                        bio: data
                            .get("subreddit")
                            .and_then(|s| s.get("public_description"))
                            .and_then(serde_json::Value::as_str)
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string),
                        created_at,
                        ..Profile::default()
                    }
                })
                .unwrap_or_default()
        } else {
            Profile::default()
        };

        ProviderResult {
            provider: "reddit".to_string(),
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

fn first_string(value: &serde_json::Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .filter_map(serde_json::Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

#[allow(clippy::cast_possible_truncation)]
fn created_utc_to_rfc3339(created_utc: f64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(created_utc as i64, 0).map(|dt| dt.to_rfc3339())
}
