//! HTTP client factory.
//!
//! One factory builds two shared connection pools: a direct client for
//! the open web and, when a SOCKS5h proxy is configured, a proxied
//! client used exclusively for `.onion` hosts. Redirects are followed
//! to a bounded depth by the client; the final URL is compared against
//! the requested one so cross-host redirects are recorded on the page.

use crate::error::{Result, ScanError};
use seeker_core::AppConfig;
use seeker_registry::UaProfile;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, Method, Response};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Redirect depth cap for all clients.
pub const MAX_REDIRECTS: usize = 5;

/// Idle connections are closed after this long.
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Body cap for HTML pages.
pub const HTML_BODY_CAP: usize = 2 * 1024 * 1024;

/// Body cap for JSON API responses.
pub const JSON_BODY_CAP: usize = 16 * 1024 * 1024;

/// A fetched response body plus the transport facts the classifier needs.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL the response actually came from, after redirects
    pub final_url: Url,
    /// HTTP status code
    pub http_status: u16,
    /// `Content-Type` header, lowercased, parameters stripped
    pub content_type: Option<String>,
    /// Decoded body, possibly truncated at the cap
    pub body: String,
    /// Whether the body hit the size cap
    pub truncated: bool,
    /// Whether a redirect moved the request to a different host
    pub cross_host_redirect: bool,
}

/// Factory for request-issuing clients.
pub struct ClientFactory {
    direct: Client,
    onion: Option<Client>,
}

impl ClientFactory {
    /// Build the shared clients from configuration.
    ///
    /// # Errors
    /// Returns error when a client cannot be constructed or the
    /// configured proxy URL is invalid.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let direct = Self::builder(config).build()?;

        let onion = match config.proxy.socks_url.as_deref() {
            Some(proxy_url) if !proxy_url.trim().is_empty() => {
                let proxy = reqwest::Proxy::all(proxy_url)?;
                Some(Self::builder(config).proxy(proxy).build()?)
            }
            _ => None,
        };

        Ok(Self { direct, onion })
    }

    fn builder(config: &AppConfig) -> reqwest::ClientBuilder {
        Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .connect_timeout(Duration::from_secs(config.scanning.request_timeout_secs))
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .gzip(true)
    }

    /// Whether a host is a Tor onion service.
    #[must_use]
    pub fn is_onion_host(host: &str) -> bool {
        host.to_lowercase().ends_with(".onion")
    }

    /// Pick the client for a URL: proxied for `.onion`, direct otherwise.
    ///
    /// # Errors
    /// Returns [`ScanError::OnionWithoutProxy`] when an onion host is
    /// requested without a configured proxy.
    pub fn client_for(&self, url: &Url) -> Result<&Client> {
        let host = url
            .host_str()
            .ok_or_else(|| ScanError::MissingHost {
                url: url.to_string(),
            })?;

        if Self::is_onion_host(host) {
            self.onion.as_ref().ok_or_else(|| ScanError::OnionWithoutProxy {
                host: host.to_string(),
            })
        } else {
            Ok(&self.direct)
        }
    }

    /// Issue a request and read the body up to `cap` bytes.
    ///
    /// # Errors
    /// Returns transport errors; non-2xx statuses are data, not errors.
    pub async fn fetch_page(
        &self,
        method: &str,
        url: &Url,
        ua: &UaProfile,
        extra_headers: &BTreeMap<String, String>,
        timeout: Duration,
        cap: usize,
    ) -> Result<FetchedPage> {
        let client = self.client_for(url)?;
        let method = Method::from_bytes(method.as_bytes()).unwrap_or(Method::GET);

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value(ua.user_agent));
        headers.insert(ACCEPT, header_value(ua.accept));
        headers.insert(ACCEPT_LANGUAGE, header_value(ua.accept_language));
        for (k, v) in extra_headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(v),
            ) {
                headers.insert(name, value);
            }
        }

        let requested_host = url.host_str().map(str::to_lowercase);

        let response = client
            .request(method, url.clone())
            .headers(headers)
            .timeout(timeout)
            .send()
            .await?;

        let http_status = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or("").trim().to_lowercase());

        let cross_host_redirect = match (&requested_host, final_url.host_str()) {
            (Some(requested), Some(landed)) => !landed.eq_ignore_ascii_case(requested),
            _ => false,
        };

        let (bytes, truncated) = read_capped(response, cap).await?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        Ok(FetchedPage {
            final_url,
            http_status,
            content_type,
            body,
            truncated,
            cross_host_redirect,
        })
    }
}

/// Read a response body, stopping at `cap` bytes.
///
/// Returns the collected bytes and whether the cap was hit.
pub async fn read_capped(mut response: Response, cap: usize) -> Result<(Vec<u8>, bool)> {
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = response.chunk().await? {
        if buf.len() + chunk.len() > cap {
            buf.extend_from_slice(&chunk[..cap - buf.len()]);
            return Ok((buf, true));
        }
        buf.extend_from_slice(&chunk);
    }

    Ok((buf, false))
}

fn header_value(v: &str) -> HeaderValue {
    HeaderValue::from_str(v).unwrap_or_else(|_| HeaderValue::from_static(""))
}
