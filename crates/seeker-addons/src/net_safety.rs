//! SSRF guard for addon fetches.
//!
//! Avatar downloads are driven by URLs scraped from untrusted pages,
//! so the fetcher validates every hop: scheme allow-list, onion and
//! localhost refusal, cloud-metadata names, and private / loopback /
//! link-local / multicast / reserved IP space both for literals and
//! for every resolved address. Redirects are disabled on the client
//! and walked manually so each location is re-validated before it is
//! followed.

use crate::error::{AddonError, Result};
use reqwest::header::ACCEPT;
use reqwest::Client;
use std::net::IpAddr;
use std::time::Duration;
use url::{Host, Url};

/// Maximum manually-followed redirect hops.
const MAX_REDIRECTS: usize = 3;

/// Hostnames that always refer to the local machine.
const LOCAL_HOSTS: &[&str] = &["localhost", "localhost.localdomain"];

/// Well-known cloud metadata endpoints.
const METADATA_HOSTS: &[&str] = &["metadata.google.internal", "metadata", "169.254.169.254"];

/// Whether an IP belongs to space we refuse to fetch from.
#[must_use]
pub fn is_ip_blocked(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || v4.is_documentation()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_multicast()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // fe80::/10 link local
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Static checks that need no DNS: scheme, host shape, known-bad names.
///
/// # Errors
/// Returns [`AddonError::UnsafeUrl`] naming the first failed check.
pub fn assert_url_safe(url: &Url) -> Result<()> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AddonError::UnsafeUrl("scheme not allowed".to_string()));
    }

    let host = match url.host() {
        Some(host) => host,
        None => return Err(AddonError::UnsafeUrl("missing host".to_string())),
    };

    match host {
        Host::Domain(domain) => {
            let domain = domain.to_lowercase();
            if domain.ends_with(".onion") {
                return Err(AddonError::UnsafeUrl("onion_host".to_string()));
            }
            if LOCAL_HOSTS.contains(&domain.as_str()) {
                return Err(AddonError::UnsafeUrl("localhost blocked".to_string()));
            }
            if METADATA_HOSTS.contains(&domain.as_str()) {
                return Err(AddonError::UnsafeUrl("metadata host blocked".to_string()));
            }
        }
        Host::Ipv4(v4) => {
            if is_ip_blocked(IpAddr::V4(v4)) {
                return Err(AddonError::UnsafeUrl("ip blocked".to_string()));
            }
        }
        Host::Ipv6(v6) => {
            if is_ip_blocked(IpAddr::V6(v6)) {
                return Err(AddonError::UnsafeUrl("ip blocked".to_string()));
            }
        }
    }

    Ok(())
}

/// SSRF-guarded byte fetcher with size and content-type controls.
pub struct SafeFetcher {
    client: Client,
    allow_private: bool,
}

impl Default for SafeFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SafeFetcher {
    /// Build the fetcher. Redirects are disabled on the client; the
    /// fetcher walks them manually with per-hop validation.
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("build safe-fetch client");

        Self {
            client,
            allow_private: false,
        }
    }

    /// Skip the private/loopback address checks (intranet scans).
    #[must_use]
    pub fn allow_private_hosts(mut self) -> Self {
        self.allow_private = true;
        self
    }

    /// Validate a URL, resolving its host when it is not an IP literal.
    async fn validate(&self, url: &Url) -> Result<()> {
        if self.allow_private {
            // Intranet mode: scheme and onion checks still apply.
            if !matches!(url.scheme(), "http" | "https") {
                return Err(AddonError::UnsafeUrl("scheme not allowed".to_string()));
            }
            if let Some(Host::Domain(domain)) = url.host() {
                if domain.to_lowercase().ends_with(".onion") {
                    return Err(AddonError::UnsafeUrl("onion_host".to_string()));
                }
            }
            return Ok(());
        }

        assert_url_safe(url)?;

        if let Some(Host::Domain(domain)) = url.host() {
            let port = url.port_or_known_default().unwrap_or(443);
            let addrs = tokio::net::lookup_host((domain, port))
                .await
                .map_err(|_| AddonError::UnsafeUrl("host did not resolve".to_string()))?;

            for addr in addrs {
                if is_ip_blocked(addr.ip()) {
                    return Err(AddonError::UnsafeUrl(
                        "host resolves to blocked ip".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Fetch bytes from a URL with SSRF, size, and content-type checks.
    ///
    /// Returns the body and the bare content type. Redirects are
    /// followed up to three hops, each re-validated.
    ///
    /// # Errors
    /// Any guard or transport failure; see [`AddonError`].
    pub async fn fetch(
        &self,
        url: &str,
        max_bytes: u64,
        accept_prefix: Option<&str>,
        timeout: Duration,
    ) -> Result<(Vec<u8>, String)> {
        let mut next = Url::parse(url).map_err(|e| AddonError::UnsafeUrl(e.to_string()))?;

        for _ in 0..=MAX_REDIRECTS {
            self.validate(&next).await?;

            let mut request = self.client.get(next.clone()).timeout(timeout);
            if let Some(prefix) = accept_prefix {
                request = request.header(ACCEPT, format!("{prefix}/*"));
            }

            let mut response = request.send().await?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        AddonError::UnsafeUrl("redirect without location".to_string())
                    })?;
                next = next
                    .join(location)
                    .map_err(|e| AddonError::UnsafeUrl(e.to_string()))?;
                continue;
            }

            if !status.is_success() {
                return Err(AddonError::BadStatus(status.as_u16()));
            }

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(';').next().unwrap_or("").trim().to_lowercase())
                .unwrap_or_default();

            if let Some(prefix) = accept_prefix {
                if !content_type.starts_with(&format!("{prefix}/")) {
                    return Err(AddonError::UnsupportedContentType(content_type));
                }
            }

            if let Some(len) = response.content_length() {
                if len > max_bytes {
                    return Err(AddonError::TooLarge { limit: max_bytes });
                }
            }

            let mut buf: Vec<u8> = Vec::new();
            while let Some(chunk) = response.chunk().await? {
                if buf.len() as u64 + chunk.len() as u64 > max_bytes {
                    return Err(AddonError::TooLarge { limit: max_bytes });
                }
                buf.extend_from_slice(&chunk);
            }

            return Ok((buf, content_type));
        }

        Err(AddonError::TooManyRedirects)
    }
}
