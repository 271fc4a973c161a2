//! The prober contract and the generic data-driven prober.
//!
//! A prober turns `(username)` into exactly one [`ProviderResult`]. It
//! never returns an error: every failure mode is folded into the
//! result's status so one misbehaving provider can't take down a scan.

use crate::classify::{classify, ClassifyInput};
use crate::client::{ClientFactory, HTML_BODY_CAP, JSON_BODY_CAP};
use crate::extract::{extract_html, extract_json_profile};
use crate::limiter::RateController;
use async_trait::async_trait;
use chrono::Utc;
use seeker_core::{Profile, ProviderResult, ResultStatus, Username};
use seeker_registry::Provider;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// Shared handles a prober needs to issue requests.
#[derive(Clone)]
pub struct ProbeContext {
    /// HTTP client factory
    pub clients: Arc<ClientFactory>,
    /// Rate and concurrency controller
    pub limiter: Arc<RateController>,
    /// Cooperative stop signal; checked before each request
    pub cancel: CancellationToken,
}

/// A configured or coded method for probing one site for a username.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Unique provider name this prober answers for.
    fn name(&self) -> &str;

    /// Per-request timeout, used to derive the per-provider deadline.
    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    /// Probe one username. Must not panic in normal operation; every
    /// failure becomes a `status = error` result.
    async fn check(&self, ctx: &ProbeContext, username: &Username) -> ProviderResult;
}

/// Generic prober driven entirely by a compiled YAML descriptor.
pub struct GenericProber {
    descriptor: Arc<Provider>,
}

impl GenericProber {
    /// Wrap a compiled descriptor.
    #[must_use]
    pub fn new(descriptor: Arc<Provider>) -> Self {
        Self { descriptor }
    }

    async fn fetch_and_classify(
        &self,
        ctx: &ProbeContext,
        username: &Username,
        url: &Url,
    ) -> Result<(ResultStatus, Option<u16>, Profile), String> {
        let provider = &self.descriptor;

        // Permit scope ends with the page fetch so the sibling JSON
        // fetch can take its own slot without double-holding.
        let page = {
            let _permit = ctx
                .limiter
                .acquire(url)
                .await
                .map_err(|e| e.short_message())?;

            if ctx.cancel.is_cancelled() {
                return Err("cancelled".to_string());
            }

            ctx.clients
                .fetch_page(
                    &provider.method,
                    url,
                    provider.ua_profile,
                    &provider.headers,
                    provider.timeout,
                    HTML_BODY_CAP,
                )
                .await
                .map_err(|e| e.short_message())?
        };

        if page.cross_host_redirect {
            debug!(
                provider = %provider.name,
                final_url = %page.final_url,
                "request was redirected across hosts"
            );
        }

        let meta = extract_html(&page.body);
        let status = classify(
            provider,
            username.as_str(),
            ClassifyInput {
                http_status: page.http_status,
                body: &page.body,
                og_title_present: meta.og_title_present,
                metadata_title_present: meta.metadata_title_present,
            },
        );

        // Extraction only applies to responses that plausibly belong to
        // the probed handle.
        let mut profile = match status {
            ResultStatus::Found | ResultStatus::Unknown
                if (200..300).contains(&page.http_status) =>
            {
                meta.profile
            }
            _ => Profile::default(),
        };

        if matches!(status, ResultStatus::Found | ResultStatus::Unknown) {
            if let Some(endpoint) = provider.expand_json_endpoint(username.as_str()) {
                self.merge_json_endpoint(ctx, &endpoint, &mut profile).await;
            }
        }

        Ok((status, Some(page.http_status), profile))
    }

    /// Best-effort sibling JSON fetch; failures leave the profile as-is.
    async fn merge_json_endpoint(&self, ctx: &ProbeContext, endpoint: &str, profile: &mut Profile) {
        let provider = &self.descriptor;

        let Ok(url) = Url::parse(endpoint) else {
            return;
        };
        let Ok(_permit) = ctx.limiter.acquire(&url).await else {
            return;
        };
        if ctx.cancel.is_cancelled() {
            return;
        }

        let page = match ctx
            .clients
            .fetch_page(
                "GET",
                &url,
                provider.ua_profile,
                &BTreeMap::new(),
                provider.timeout,
                JSON_BODY_CAP,
            )
            .await
        {
            Ok(page) if (200..300).contains(&page.http_status) => page,
            _ => return,
        };

        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&page.body) {
            profile.merge_missing(extract_json_profile(&value));
        }
    }
}

#[async_trait]
impl Prober for GenericProber {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn timeout(&self) -> Duration {
        self.descriptor.timeout
    }

    async fn check(&self, ctx: &ProbeContext, username: &Username) -> ProviderResult {
        let start = Instant::now();
        let url_string = self.descriptor.expand_url(username.as_str());

        let url = match Url::parse(&url_string) {
            Ok(url) => url,
            Err(e) => {
                return ProviderResult::error(
                    self.name(),
                    username.as_str(),
                    url_string,
                    elapsed_ms(start),
                    format!("invalid url: {e}"),
                );
            }
        };

        match self.fetch_and_classify(ctx, username, &url).await {
            Ok((status, http_status, profile)) => ProviderResult {
                provider: self.name().to_string(),
                username: username.as_str().to_string(),
                url: url_string,
                status,
                http_status,
                elapsed_ms: elapsed_ms(start),
                error: None,
                profile,
                timestamp: Utc::now(),
            },
            Err(message) => ProviderResult::error(
                self.name(),
                username.as_str(),
                url_string,
                elapsed_ms(start),
                message,
            ),
        }
    }
}

/// Milliseconds since `start`, saturating.
#[must_use]
pub fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use seeker_core::AppConfig;
    use seeker_registry::ProviderSpec;

    fn context() -> ProbeContext {
        let mut config = AppConfig::default();
        config.proxy.socks_url = None;
        ProbeContext {
            clients: Arc::new(ClientFactory::new(&config).expect("build factory")),
            limiter: Arc::new(RateController::new(&config.scanning)),
            cancel: CancellationToken::new(),
        }
    }

    fn prober_for(server: &Server, spec_patch: impl FnOnce(&mut ProviderSpec)) -> GenericProber {
        let mut spec = ProviderSpec {
            url: format!("http://{}/u/{{username}}", server.addr()),
            ..ProviderSpec::default()
        };
        spec_patch(&mut spec);
        let provider = Provider::compile("demo", &spec).expect("compile provider");
        GenericProber::new(Arc::new(provider))
    }

    #[tokio::test]
    async fn test_found_via_success_patterns() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/u/alice")).respond_with(
                status_code(200).body("<html>profile page, 10 followers</html>"),
            ),
        );

        let prober = prober_for(&server, |s| {
            s.success_patterns = vec!["profile".to_string(), "followers".to_string()];
        });
        let username = Username::new("alice").expect("valid username");

        let result = prober.check(&context(), &username).await;
        assert_eq!(result.status, ResultStatus::Found);
        assert_eq!(result.http_status, Some(200));
        assert!(result.url.ends_with("/u/alice"));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_not_found_via_status() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/u/ghost"))
                .respond_with(status_code(404).body("nope")),
        );

        let prober = prober_for(&server, |_| {});
        let username = Username::new("ghost").expect("valid username");

        let result = prober.check(&context(), &username).await;
        assert_eq!(result.status, ResultStatus::NotFound);
        assert!(result.profile.display_name.is_none());
    }

    #[tokio::test]
    async fn test_blocked_via_status() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/u/alice"))
                .respond_with(status_code(429)),
        );

        let prober = prober_for(&server, |_| {});
        let username = Username::new("alice").expect("valid username");

        let result = prober.check(&context(), &username).await;
        assert_eq!(result.status, ResultStatus::Blocked);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_unknown_without_evidence() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/u/alice"))
                .respond_with(status_code(200).body("<html><title>Hi</title></html>")),
        );

        let prober = prober_for(&server, |_| {});
        let username = Username::new("alice").expect("valid username");

        let result = prober.check(&context(), &username).await;
        assert_eq!(result.status, ResultStatus::Unknown);
    }

    #[tokio::test]
    async fn test_transport_error_is_error_status() {
        // Point at a server that is not listening.
        let spec = ProviderSpec {
            url: "http://127.0.0.1:1/u/{username}".to_string(),
            ..ProviderSpec::default()
        };
        let provider = Provider::compile("dead", &spec).expect("compile provider");
        let prober = GenericProber::new(Arc::new(provider));
        let username = Username::new("alice").expect("valid username");

        let result = prober.check(&context(), &username).await;
        assert_eq!(result.status, ResultStatus::Error);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_profile_extracted_on_found() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/u/alice")).respond_with(
                status_code(200).body(
                    r#"<html><head>
                        <meta property="og:title" content="Alice Doe">
                        <meta property="og:image" content="https://cdn.example/a.png">
                    </head><body>profile</body></html>"#,
                ),
            ),
        );

        let prober = prober_for(&server, |s| {
            s.success_patterns = vec!["profile".to_string()];
        });
        let username = Username::new("alice").expect("valid username");

        let result = prober.check(&context(), &username).await;
        assert_eq!(result.status, ResultStatus::Found);
        assert_eq!(result.profile.display_name.as_deref(), Some("Alice Doe"));
        assert_eq!(
            result.profile.avatar_url.as_deref(),
            Some("https://cdn.example/a.png")
        );
    }

    #[tokio::test]
    async fn test_json_endpoint_fills_gaps() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/u/alice"))
                .respond_with(status_code(200).body("<html>profile</html>")),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/users/alice")).respond_with(
                status_code(200)
                    .append_header("Content-Type", "application/json")
                    .body(r#"{"name": "Alice Doe", "followers": 99}"#),
            ),
        );

        let prober = prober_for(&server, |s| {
            s.success_patterns = vec!["profile".to_string()];
            s.json_endpoint = Some(format!("http://{}/api/users/{{username}}", server.addr()));
        });
        let username = Username::new("alice").expect("valid username");

        let result = prober.check(&context(), &username).await;
        assert_eq!(result.status, ResultStatus::Found);
        assert_eq!(result.profile.display_name.as_deref(), Some("Alice Doe"));
        assert_eq!(result.profile.followers, Some(99));
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let server = Server::run();
        let prober = prober_for(&server, |_| {});
        let username = Username::new("alice").expect("valid username");

        let ctx = context();
        ctx.cancel.cancel();

        let result = prober.check(&ctx, &username).await;
        assert_eq!(result.status, ResultStatus::Error);
        assert_eq!(result.error.as_deref(), Some("cancelled"));
    }
}
