//! Have I Been Pwned breach lookup driver.
//!
//! `GET /api/v3/breachedaccount/{account}?truncateResponse=false` with
//! the `hibp-api-key` header. 404 means the account appears in no known
//! breach; 200 returns the breach list. Without an API key the driver
//! still registers and reports itself unconfigured instead of erroring.

use crate::client::JSON_BODY_CAP;
use crate::probe::{elapsed_ms, ProbeContext, Prober};
use async_trait::async_trait;
use chrono::Utc;
use seeker_core::{Profile, ProviderResult, ResultStatus, Username};
use seeker_registry::{ua_profile, UaProfile};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use url::Url;

const API_BASE: &str = "https://haveibeenpwned.com/api/v3";
const PROJECT_UA: &str = "seeker (HIBP)";

/// Breach lookup prober.
pub struct HibpProber {
    api_base: String,
    api_key: Option<String>,
    ua: &'static UaProfile,
}

impl HibpProber {
    /// Create the prober; `api_key` of `None` leaves it unconfigured.
    #[must_use]
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_base: API_BASE.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            ua: ua_profile("desktop_chrome").expect("known ua profile"),
        }
    }

    /// Point the prober at a different API base (tests).
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

#[async_trait]
impl Prober for HibpProber {
    fn name(&self) -> &str {
        "hibp"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(12)
    }

    async fn check(&self, ctx: &ProbeContext, username: &Username) -> ProviderResult {
        let start = Instant::now();
        let display_url = format!("{}/breachedaccount/{}", self.api_base, username.as_str());

        let Some(api_key) = self.api_key.clone() else {
            return ProviderResult {
                provider: "hibp".to_string(),
                username: username.as_str().to_string(),
                url: display_url,
                status: ResultStatus::Unknown,
                http_status: None,
                elapsed_ms: elapsed_ms(start),
                error: Some("api key not configured".to_string()),
                profile: Profile::default(),
                timestamp: Utc::now(),
            };
        };

        let fail = |message: String, start: Instant| {
            ProviderResult::error(
                "hibp",
                username.as_str(),
                display_url.clone(),
                elapsed_ms(start),
                message,
            )
        };

        let api_url = format!("{display_url}?truncateResponse=false");
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
        headers.insert("hibp-api-key".to_string(), api_key);
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
            401 | 403 | 429 => ResultStatus::Blocked,
            s if (200..300).contains(&s) => ResultStatus::Found,
            _ => ResultStatus::Unknown,
        };

        let profile = if status == ResultStatus::Found {
            breach_summary(&page.body)
        } else {
            Profile::default()
        };

        ProviderResult {
            provider: "hibp".to_string(),
            username: username.as_str().to_string(),
            url: display_url,
            status,
            http_status: Some(page.http_status),
            elapsed_ms: elapsed_ms(start),
            error: None,
            profile,
            timestamp: Utc::now(),
        }
    }
}

/// Condense the breach list into the profile bio.
fn breach_summary(body: &str) -> Profile {
    let Ok(breaches) = serde_json::from_str::<Vec<serde_json::Value>>(body) else {
        return Profile::default();
    };

    let names: Vec<&str> = breaches
        .iter()
        .filter_map(|b| b.get("Name").and_then(serde_json::Value::as_str))
        .collect();

    if names.is_empty() {
        return Profile::default();
    }

    let shown = names.iter().take(5).copied().collect::<Vec<_>>().join(", ");
    let bio = if names.len() > 5 {
        format!("Breached in: {} (+{} more)", shown, names.len() - 5)
    } else {
        format!("Breached in: {shown}")
    };

    Profile {
        bio: Some(bio),
        ..Profile::default()
    }
}
