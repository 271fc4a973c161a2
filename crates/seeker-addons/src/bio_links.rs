//! Bio link extraction.
//!
//! Pulls URLs, bare hostnames, and `@handle` tokens out of profile bio
//! text and derives a lowercased domain list. Purely lexical; no
//! network I/O.

use crate::{Addon, AddonContext};
use async_trait::async_trait;
use regex::Regex;
use seeker_core::ProviderResult;
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

/// Tokens longer than this are ignored (tracking URLs, data URIs).
const MAX_FRAGMENT_LEN: usize = 256;

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)https?://[^\s)\]]+").expect("valid regex"))
}

fn domain_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:[a-z0-9-]{1,63}\.)+(?:[a-z]{2,63})\b").expect("valid regex")
    })
}

fn handle_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(^|[^\w@])@([a-z0-9_.]{2,30})").expect("valid regex"))
}

fn dedupe(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for v in values {
        let v = v.trim().to_string();
        if v.is_empty() || v.len() > MAX_FRAGMENT_LEN {
            continue;
        }
        if seen.insert(v.to_lowercase()) {
            out.push(v);
        }
    }
    out
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
}

/// Lowercased registrable domain: last two labels of the hostname.
fn registrable_domain(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        host.to_string()
    } else {
        labels[labels.len() - 2..].join(".")
    }
}

/// Extract URLs, domains, and handles from bio text.
pub struct BioLinksAddon;

impl Default for BioLinksAddon {
    fn default() -> Self {
        Self::new()
    }
}

impl BioLinksAddon {
    /// Create the addon.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Addon for BioLinksAddon {
    fn name(&self) -> &str {
        "bio_links"
    }

    async fn run(&self, _ctx: &AddonContext, results: &mut Vec<ProviderResult>) {
        for result in results {
            let profile = &mut result.profile;
            let text = match &profile.bio {
                Some(bio) if !bio.trim().is_empty() => bio.clone(),
                _ => continue,
            };

            let urls = dedupe(url_re().find_iter(&text).map(|m| m.as_str().to_string()));

            let mut domains: Vec<String> = urls
                .iter()
                .filter_map(|u| host_of(u))
                .map(|h| registrable_domain(&h))
                .collect();

            // Bare hostnames in plain text, minus those already seen
            // through full URLs.
            let from_urls: HashSet<String> = domains.iter().cloned().collect();
            for m in domain_re().find_iter(&text) {
                let fragment = m.as_str();
                if fragment.len() > MAX_FRAGMENT_LEN {
                    continue;
                }
                // Skip matches that are part of a captured URL.
                if urls.iter().any(|u| u.contains(fragment)) {
                    continue;
                }
                let domain = registrable_domain(&fragment.to_lowercase());
                if !from_urls.contains(&domain) {
                    domains.push(domain);
                }
            }

            let handles = dedupe(
                handle_re()
                    .captures_iter(&text)
                    .map(|c| c[2].to_string()),
            );

            profile.bio_urls = urls;
            profile.bio_domains = dedupe(domains);
            profile.bio_handles = handles;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seeker_core::{Profile, ResultStatus};
    use seeker_scanner::RateController;
    use std::sync::Arc;

    fn ctx() -> AddonContext {
        AddonContext {
            limiter: Arc::new(RateController::new(&seeker_core::ScanningConfig::default())),
            fetcher: crate::SafeFetcher::new(),
            config: seeker_core::AddonsConfig::default(),
            avatar_cache: tokio::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    fn result_with_bio(bio: &str) -> ProviderResult {
        ProviderResult {
            provider: "demo".to_string(),
            username: "alice".to_string(),
            url: "https://example.test/u/alice".to_string(),
            status: ResultStatus::Found,
            http_status: Some(200),
            elapsed_ms: 1,
            error: None,
            profile: Profile {
                bio: Some(bio.to_string()),
                ..Profile::default()
            },
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_extracts_urls_domains_and_handles() {
        let mut results = vec![result_with_bio(
            "Photos at https://www.flickr.com/people/alice and blog.alice.example \
             / reach me at @alice_pics",
        )];

        BioLinksAddon::new().run(&ctx(), &mut results).await;

        let profile = &results[0].profile;
        assert_eq!(
            profile.bio_urls,
            vec!["https://www.flickr.com/people/alice".to_string()]
        );
        assert!(profile.bio_domains.contains(&"flickr.com".to_string()));
        assert!(profile.bio_domains.contains(&"alice.example".to_string()));
        assert_eq!(profile.bio_handles, vec!["alice_pics".to_string()]);
    }

    #[tokio::test]
    async fn test_schemeless_domains_lowercased() {
        let mut results = vec![result_with_bio("see My-Site.Example for details")];
        BioLinksAddon::new().run(&ctx(), &mut results).await;
        assert_eq!(results[0].profile.bio_domains, vec!["my-site.example"]);
    }

    #[tokio::test]
    async fn test_no_bio_is_untouched() {
        let mut results = vec![{
            let mut r = result_with_bio("x");
            r.profile.bio = None;
            r
        }];
        BioLinksAddon::new().run(&ctx(), &mut results).await;
        assert!(results[0].profile.bio_urls.is_empty());
        assert!(results[0].profile.bio_domains.is_empty());
    }

    #[tokio::test]
    async fn test_overlong_fragments_ignored() {
        let long = format!("https://example.test/{}", "a".repeat(300));
        let mut results = vec![result_with_bio(&long)];
        BioLinksAddon::new().run(&ctx(), &mut results).await;
        assert!(results[0].profile.bio_urls.is_empty());
    }

    #[tokio::test]
    async fn test_dedupe_case_insensitive() {
        let mut results = vec![result_with_bio("@Alice and @alice and @ALICE")];
        BioLinksAddon::new().run(&ctx(), &mut results).await;
        assert_eq!(results[0].profile.bio_handles.len(), 1);
    }
}
