//! Profile extraction from HTML and JSON payloads.
//!
//! Sources are tried in order: JSON-LD `Person` fragments, OpenGraph,
//! Twitter-Card, then the plain `<title>` tag. Fields are unioned and
//! later sources never overwrite earlier non-empty values. Malformed
//! markup yields an empty bag, never an error.

use regex::Regex;
use scraper::{Html, Selector};
use seeker_core::Profile;
use std::sync::OnceLock;

/// Extraction outcome plus the presence facts the classifier needs.
#[derive(Debug, Clone, Default)]
pub struct ExtractedMeta {
    /// Unioned profile fields
    pub profile: Profile,
    /// A non-empty `og:title` was present
    pub og_title_present: bool,
    /// Any metadata source yielded a non-empty title
    pub metadata_title_present: bool,
}

/// Extract profile metadata from an HTML document.
#[must_use]
pub fn extract_html(html: &str) -> ExtractedMeta {
    let document = Html::parse_document(html);

    let mut profile = json_ld_person(&document);
    let metadata_title_from_json_ld = profile.display_name.is_some();

    let og_title = meta_content(&document, "og:title");
    let og = Profile {
        display_name: og_title.clone(),
        bio: meta_content(&document, "og:description"),
        avatar_url: meta_content(&document, "og:image"),
        canonical_url: meta_content(&document, "og:url"),
        ..Profile::default()
    };
    profile.merge_missing(og);

    let twitter = Profile {
        display_name: meta_content(&document, "twitter:title"),
        bio: meta_content(&document, "twitter:description"),
        avatar_url: meta_content(&document, "twitter:image"),
        ..Profile::default()
    };
    profile.merge_missing(twitter);

    if profile.display_name.is_none() {
        profile.display_name = title_text(&document);
    }

    let counts = extract_counts(&html.to_lowercase());
    profile.merge_missing(counts);

    ExtractedMeta {
        og_title_present: og_title.is_some(),
        metadata_title_present: metadata_title_from_json_ld
            || profile.display_name.is_some(),
        profile,
    }
}

/// Map a provider JSON payload onto the profile bag.
///
/// Recognizes the field names common to user-info endpoints: `name` or
/// `display_name` or `login`, `avatar_url` or `icon_img`, `bio` or
/// `description`, follower/following counts, `created_at`.
#[must_use]
pub fn extract_json_profile(value: &serde_json::Value) -> Profile {
    let obj = match value.as_object() {
        Some(obj) => obj,
        None => return Profile::default(),
    };

    let get_str = |keys: &[&str]| {
        keys.iter()
            .filter_map(|k| obj.get(*k))
            .filter_map(serde_json::Value::as_str)
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    };
    let get_count = |keys: &[&str]| {
        keys.iter()
            .filter_map(|k| obj.get(*k))
            .find_map(serde_json::Value::as_u64)
    };

    Profile {
        display_name: get_str(&["name", "display_name", "login", "username"]),
        avatar_url: get_str(&["avatar_url", "icon_img", "profile_image_url", "image"]),
        bio: get_str(&["bio", "description", "about"]),
        canonical_url: get_str(&["html_url", "url"]),
        followers: get_count(&["followers", "followers_count", "follower_count"]),
        following: get_count(&["following", "following_count"]),
        subscribers: get_count(&["subscribers", "subscribers_count"]),
        created_at: get_str(&["created_at", "created"]),
        ..Profile::default()
    }
}

fn meta_content(document: &Html, prop: &str) -> Option<String> {
    // Some sites use `property`, some `name`; accept either.
    for attr in ["property", "name"] {
        let selector = Selector::parse(&format!("meta[{attr}=\"{prop}\"]")).ok()?;
        if let Some(content) = document
            .select(&selector)
            .filter_map(|el| el.value().attr("content"))
            .map(str::trim)
            .find(|c| !c.is_empty())
        {
            return Some(content.to_string());
        }
    }
    None
}

fn title_text(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|t| !t.is_empty())
}

/// Pull profile fields out of JSON-LD `Person` fragments.
fn json_ld_person(document: &Html) -> Profile {
    let Ok(selector) = Selector::parse("script[type=\"application/ld+json\"]") else {
        return Profile::default();
    };

    for block in document.select(&selector) {
        let text = block.text().collect::<String>();
        let Ok(data) = serde_json::from_str::<serde_json::Value>(text.trim()) else {
            continue;
        };

        if let Some(profile) = find_person(&data) {
            return profile;
        }
    }

    Profile::default()
}

fn find_person(value: &serde_json::Value) -> Option<Profile> {
    match value {
        serde_json::Value::Array(items) => items.iter().find_map(find_person),
        serde_json::Value::Object(obj) => {
            if let Some(graph) = obj.get("@graph") {
                if let Some(found) = find_person(graph) {
                    return Some(found);
                }
            }

            let is_person = obj
                .get("@type")
                .map(|t| match t {
                    serde_json::Value::String(s) => s == "Person",
                    serde_json::Value::Array(a) => {
                        a.iter().any(|v| v.as_str() == Some("Person"))
                    }
                    _ => false,
                })
                .unwrap_or(false);
            if !is_person {
                return None;
            }

            let name = obj
                .get("name")
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            let image = obj.get("image").and_then(coerce_image);
            let url = obj
                .get("url")
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            let bio = obj
                .get("description")
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);

            if name.is_none() && image.is_none() && url.is_none() && bio.is_none() {
                return None;
            }

            Some(Profile {
                display_name: name,
                avatar_url: image,
                canonical_url: url,
                bio,
                ..Profile::default()
            })
        }
        _ => None,
    }
}

/// `image` in JSON-LD may be a string, an ImageObject, or a list.
fn coerce_image(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Object(obj) => obj
            .get("url")
            .or_else(|| obj.get("contentUrl"))
            .and_then(coerce_image),
        serde_json::Value::Array(items) => items.first().and_then(coerce_image),
        _ => None,
    }
}

/// Parse humanized counts like `1,234`, `12.3K`, `4M` into integers.
#[must_use]
pub fn parse_human_count(s: &str) -> Option<u64> {
    static KM_RE: OnceLock<Regex> = OnceLock::new();
    static INT_RE: OnceLock<Regex> = OnceLock::new();

    let km = KM_RE.get_or_init(|| {
        Regex::new(r"^([0-9]+(?:\.[0-9]+)?)\s*([KM])$").expect("valid regex")
    });
    let int = INT_RE.get_or_init(|| Regex::new(r"^[0-9][0-9,]*$").expect("valid regex"));

    let t = s.trim().to_uppercase().replace(' ', "");
    if t.is_empty() {
        return None;
    }

    if let Some(caps) = km.captures(&t) {
        let base: f64 = caps[1].parse().ok()?;
        let mult = if &caps[2] == "K" { 1_000.0 } else { 1_000_000.0 };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        return Some((base * mult) as u64);
    }

    if int.is_match(&t) {
        return t.replace(',', "").parse().ok();
    }

    None
}

/// Best-effort sniffing of follower/following/subscriber counts from
/// lowercased page text. Conservative on purpose; many pages mention
/// these words with no count attached.
#[must_use]
pub fn extract_counts(text_lower: &str) -> Profile {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();

    let patterns = PATTERNS.get_or_init(|| {
        [
            (r"([0-9][0-9,\.]*\s*[km]?)\s+followers\b", "followers"),
            (r"([0-9][0-9,\.]*\s*[km]?)\s+following\b", "following"),
            (r"([0-9][0-9,\.]*\s*[km]?)\s+subscribers\b", "subscribers"),
        ]
        .into_iter()
        .map(|(pat, key)| (Regex::new(pat).expect("valid regex"), key))
        .collect()
    });

    let mut profile = Profile::default();
    for (re, key) in patterns {
        if let Some(caps) = re.captures(text_lower) {
            if let Some(value) = parse_human_count(&caps[1].to_uppercase()) {
                match *key {
                    "followers" => profile.followers = Some(value),
                    "following" => profile.following = Some(value),
                    "subscribers" => profile.subscribers = Some(value),
                    _ => {}
                }
            }
        }
    }

    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opengraph_extraction() {
        let html = r#"
            <html><head>
                <meta property="og:title" content="Alice Doe">
                <meta property="og:description" content="Photographer. alice.example">
                <meta property="og:image" content="https://cdn.example/alice.png">
                <meta property="og:url" content="https://example.test/u/alice">
            </head><body></body></html>
        "#;

        let meta = extract_html(html);
        assert!(meta.og_title_present);
        assert_eq!(meta.profile.display_name.as_deref(), Some("Alice Doe"));
        assert_eq!(
            meta.profile.avatar_url.as_deref(),
            Some("https://cdn.example/alice.png")
        );
        assert_eq!(
            meta.profile.canonical_url.as_deref(),
            Some("https://example.test/u/alice")
        );
    }

    #[test]
    fn test_twitter_card_fills_gaps_only() {
        let html = r#"
            <html><head>
                <meta property="og:title" content="From OG">
                <meta name="twitter:title" content="From Twitter">
                <meta name="twitter:image" content="https://cdn.example/t.png">
            </head></html>
        "#;

        let meta = extract_html(html);
        assert_eq!(meta.profile.display_name.as_deref(), Some("From OG"));
        assert_eq!(
            meta.profile.avatar_url.as_deref(),
            Some("https://cdn.example/t.png")
        );
    }

    #[test]
    fn test_json_ld_person_wins_over_og() {
        let html = r#"
            <html><head>
                <script type="application/ld+json">
                    {"@type": "Person", "name": "Alice From JSON-LD",
                     "image": {"url": "https://cdn.example/ld.png"}}
                </script>
                <meta property="og:title" content="From OG">
            </head></html>
        "#;

        let meta = extract_html(html);
        assert_eq!(
            meta.profile.display_name.as_deref(),
            Some("Alice From JSON-LD")
        );
        assert_eq!(
            meta.profile.avatar_url.as_deref(),
            Some("https://cdn.example/ld.png")
        );
        assert!(meta.og_title_present);
    }

    #[test]
    fn test_json_ld_non_person_ignored() {
        let html = r#"
            <html><head>
                <script type="application/ld+json">
                    {"@type": "Organization", "name": "MegaCorp"}
                </script>
            </head></html>
        "#;

        let meta = extract_html(html);
        assert!(meta.profile.display_name.is_none());
    }

    #[test]
    fn test_title_fallback() {
        let html = "<html><head><title>Hi</title></head></html>";
        let meta = extract_html(html);
        assert_eq!(meta.profile.display_name.as_deref(), Some("Hi"));
        assert!(!meta.og_title_present);
        assert!(meta.metadata_title_present);
    }

    #[test]
    fn test_malformed_markup_tolerated() {
        let meta = extract_html("<html><<<>not really html&&& <meta property=");
        assert!(meta.profile.is_empty() || meta.profile.display_name.is_some());
    }

    #[test]
    fn test_parse_human_count() {
        assert_eq!(parse_human_count("1,234"), Some(1234));
        assert_eq!(parse_human_count("12.3K"), Some(12_300));
        assert_eq!(parse_human_count("4M"), Some(4_000_000));
        assert_eq!(parse_human_count("42"), Some(42));
        assert_eq!(parse_human_count("a lot"), None);
        assert_eq!(parse_human_count(""), None);
    }

    #[test]
    fn test_count_sniffing() {
        let profile = extract_counts("alice has 12.3k followers and 420 following here");
        assert_eq!(profile.followers, Some(12_300));
        assert_eq!(profile.following, Some(420));
        assert_eq!(profile.subscribers, None);
    }

    #[test]
    fn test_json_profile_extraction() {
        let value = serde_json::json!({
            "login": "alice",
            "name": "Alice Doe",
            "avatar_url": "https://cdn.example/a.png",
            "bio": "photographer",
            "followers": 120,
            "following": 33,
            "created_at": "2015-04-01T10:00:00Z",
            "html_url": "https://example.test/alice"
        });

        let profile = extract_json_profile(&value);
        assert_eq!(profile.display_name.as_deref(), Some("Alice Doe"));
        assert_eq!(profile.followers, Some(120));
        assert_eq!(profile.following, Some(33));
        assert_eq!(
            profile.created_at.as_deref(),
            Some("2015-04-01T10:00:00Z")
        );
    }
}
