//! Avatar fingerprinting: sha256 of the raw bytes plus a 64-bit
//! difference hash of the decoded image.
//!
//! The dHash is computed on a deterministic 9x8 grayscale resize:
//! each of the 8 rows contributes 8 bits by comparing horizontal
//! neighbors. Decoded pixel data is dropped as soon as the hash is
//! taken.

use crate::error::AddonError;
use crate::{Addon, AddonContext};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::DynamicImage;
use seeker_core::ProviderResult;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Content types accepted for avatar downloads.
pub const ACCEPTED_IMAGE_TYPES: &[&str] =
    &["image/png", "image/jpeg", "image/webp", "image/gif"];

/// Compute the 64-bit difference hash of an image.
///
/// Deterministic: the same image always yields the same value.
#[must_use]
pub fn dhash(img: &DynamicImage) -> u64 {
    let small = img.resize_exact(9, 8, FilterType::Lanczos3).to_luma8();

    let mut bits: u64 = 0;
    let mut bitpos = 0;
    for row in 0..8 {
        for col in 0..8 {
            let left = small.get_pixel(col, row).0[0];
            let right = small.get_pixel(col + 1, row).0[0];
            if left > right {
                bits |= 1 << bitpos;
            }
            bitpos += 1;
        }
    }

    bits
}

/// Hamming distance between two 64-bit hashes.
#[must_use]
pub fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Hex form used in result records.
#[must_use]
pub fn dhash_hex(bits: u64) -> String {
    format!("{bits:016x}")
}

/// Parse the hex form back into bits.
#[must_use]
pub fn parse_dhash_hex(hex: &str) -> Option<u64> {
    u64::from_str_radix(hex, 16).ok()
}

/// Download avatars and attach sha256 + dHash fingerprints.
pub struct AvatarFingerprintAddon {
    timeout: Duration,
}

impl Default for AvatarFingerprintAddon {
    fn default() -> Self {
        Self::new()
    }
}

impl AvatarFingerprintAddon {
    /// Create the addon.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }

    fn is_onion(url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase().ends_with(".onion")))
            .unwrap_or(false)
    }
}

#[async_trait]
impl Addon for AvatarFingerprintAddon {
    fn name(&self) -> &str {
        "avatar_fingerprint"
    }

    async fn run(&self, ctx: &AddonContext, results: &mut Vec<ProviderResult>) {
        for result in results {
            let profile = &mut result.profile;
            let avatar_url = match &profile.avatar_url {
                Some(url) if !url.trim().is_empty() => url.clone(),
                _ => continue,
            };

            // Already fingerprinted (e.g. a rerun over partial results).
            if profile.avatar_sha256.is_some() && profile.avatar_dhash.is_some() {
                continue;
            }

            if Self::is_onion(&avatar_url) {
                profile.avatar_fetch_error = Some("onion_host".to_string());
                continue;
            }

            let permit = match Url::parse(&avatar_url) {
                Ok(url) => ctx.limiter.acquire(&url).await.ok(),
                Err(_) => None,
            };
            let fetched = ctx
                .fetcher
                .fetch(
                    &avatar_url,
                    ctx.config.avatar_max_bytes,
                    Some("image"),
                    self.timeout,
                )
                .await;
            drop(permit);

            let (bytes, content_type) = match fetched {
                Ok(ok) => ok,
                Err(e) => {
                    debug!(provider = %result.provider, error = %e, "avatar fetch failed");
                    profile.avatar_fetch_error = Some(e.short_message());
                    continue;
                }
            };

            if !ACCEPTED_IMAGE_TYPES.contains(&content_type.as_str()) {
                profile.avatar_fetch_error = Some("unsupported_format".to_string());
                continue;
            }

            let sha = format!("{:x}", Sha256::digest(&bytes));

            let hash = match image::load_from_memory(&bytes) {
                Ok(img) => dhash(&img),
                Err(e) => {
                    profile.avatar_fetch_error =
                        Some(AddonError::Decode(e.to_string()).short_message());
                    continue;
                }
            };

            profile.avatar_sha256 = Some(sha);
            profile.avatar_dhash = Some(dhash_hex(hash));
            profile.avatar_content_type = Some(content_type);
            profile.avatar_bytes = Some(bytes.len() as u64);

            let mut cache = ctx.avatar_cache.lock().await;
            cache.insert(avatar_url, bytes);
        }
    }
}
