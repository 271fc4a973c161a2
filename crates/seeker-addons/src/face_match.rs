//! Face matching against user-supplied reference images.
//!
//! The actual face engine (detection + embedding) is a capability: the
//! addon is wired against the [`FaceEngine`] trait and degrades to an
//! `engine_unavailable` marker when no engine is installed. Matching
//! itself is a minimum Euclidean distance over reference descriptors.

use crate::{Addon, AddonContext};
use async_trait::async_trait;
use seeker_core::{FaceMatch, ProviderResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Face embedding vector.
pub type FaceDescriptor = Vec<f32>;

/// Capability interface for face detection and embedding.
///
/// Implementations detect the largest face in an image and return its
/// descriptor, or `None` when no face is present.
#[async_trait]
pub trait FaceEngine: Send + Sync {
    /// Compute the descriptor of the largest face in `image`.
    ///
    /// # Errors
    /// Returns a short message when the image cannot be processed.
    async fn descriptor(
        &self,
        image: &[u8],
    ) -> std::result::Result<Option<FaceDescriptor>, String>;
}

/// Euclidean distance between two descriptors.
///
/// Length mismatches yield infinity, which never matches.
#[must_use]
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Compare downloaded avatars against reference images.
pub struct FaceMatchAddon {
    engine: Option<Arc<dyn FaceEngine>>,
    reference_images: Vec<Vec<u8>>,
    timeout: Duration,
}

impl FaceMatchAddon {
    /// Create the addon for one scan's reference images.
    #[must_use]
    pub fn new(engine: Option<Arc<dyn FaceEngine>>, reference_images: Vec<Vec<u8>>) -> Self {
        Self {
            engine,
            reference_images,
            timeout: Duration::from_secs(10),
        }
    }

    fn is_onion(url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase().ends_with(".onion")))
            .unwrap_or(false)
    }

    async fn reference_descriptors(&self, engine: &dyn FaceEngine) -> Vec<FaceDescriptor> {
        let mut descriptors = Vec::new();
        for image in &self.reference_images {
            match engine.descriptor(image).await {
                Ok(Some(d)) => descriptors.push(d),
                Ok(None) => debug!("no face detected in a reference image"),
                Err(e) => warn!(error = %e, "could not process a reference image"),
            }
        }
        descriptors
    }

    async fn avatar_bytes(
        &self,
        ctx: &AddonContext,
        avatar_url: &str,
    ) -> std::result::Result<Vec<u8>, String> {
        {
            let cache = ctx.avatar_cache.lock().await;
            if let Some(bytes) = cache.get(avatar_url) {
                return Ok(bytes.clone());
            }
        }

        let permit = match Url::parse(avatar_url) {
            Ok(url) => ctx.limiter.acquire(&url).await.ok(),
            Err(_) => None,
        };
        let fetched = ctx
            .fetcher
            .fetch(
                avatar_url,
                ctx.config.avatar_max_bytes,
                Some("image"),
                self.timeout,
            )
            .await;
        drop(permit);

        match fetched {
            Ok((bytes, _)) => Ok(bytes),
            Err(e) => Err(e.short_message()),
        }
    }
}

#[async_trait]
impl Addon for FaceMatchAddon {
    fn name(&self) -> &str {
        "face_match"
    }

    async fn run(&self, ctx: &AddonContext, results: &mut Vec<ProviderResult>) {
        let Some(engine) = &self.engine else {
            for result in results.iter_mut() {
                if result.profile.avatar_url.is_some() {
                    result.profile.face_match_error = Some("engine_unavailable".to_string());
                }
            }
            return;
        };

        let references = self.reference_descriptors(engine.as_ref()).await;
        if references.is_empty() {
            for result in results.iter_mut() {
                if result.profile.avatar_url.is_some() {
                    result.profile.face_match_error = Some("no_reference_face".to_string());
                }
            }
            return;
        }

        let threshold = ctx.config.face_match_distance;

        for result in results {
            let profile = &mut result.profile;
            let avatar_url = match &profile.avatar_url {
                Some(url) if !url.trim().is_empty() => url.clone(),
                _ => continue,
            };

            if Self::is_onion(&avatar_url) {
                profile.face_match = Some(FaceMatch {
                    matched: false,
                    distance: None,
                    reason: Some("onion_host".to_string()),
                });
                continue;
            }

            let bytes = match self.avatar_bytes(ctx, &avatar_url).await {
                Ok(bytes) => bytes,
                Err(reason) => {
                    profile.face_match = Some(FaceMatch {
                        matched: false,
                        distance: None,
                        reason: Some(reason),
                    });
                    continue;
                }
            };

            match engine.descriptor(&bytes).await {
                Ok(Some(descriptor)) => {
                    let distance = references
                        .iter()
                        .map(|r| euclidean(r, &descriptor))
                        .fold(f32::INFINITY, f32::min);
                    profile.face_match = Some(FaceMatch {
                        matched: distance <= threshold,
                        distance: Some(distance),
                        reason: None,
                    });
                }
                Ok(None) => {
                    profile.face_match = Some(FaceMatch {
                        matched: false,
                        distance: None,
                        reason: Some("no_face".to_string()),
                    });
                }
                Err(e) => {
                    profile.face_match_error = Some(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SafeFetcher;
    use seeker_core::{Profile, ResultStatus, ScanningConfig};
    use seeker_scanner::RateController;
    use std::collections::HashMap;

    fn ctx() -> AddonContext {
        AddonContext {
            limiter: Arc::new(RateController::new(&ScanningConfig::default())),
            fetcher: SafeFetcher::new(),
            config: seeker_core::AddonsConfig::default(),
            avatar_cache: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    fn result_with_avatar(provider: &str, avatar_url: &str) -> ProviderResult {
        ProviderResult {
            provider: provider.to_string(),
            username: "alice".to_string(),
            url: format!("https://{provider}.test/alice"),
            status: ResultStatus::Found,
            http_status: Some(200),
            elapsed_ms: 1,
            error: None,
            profile: Profile {
                avatar_url: Some(avatar_url.to_string()),
                ..Profile::default()
            },
            timestamp: chrono::Utc::now(),
        }
    }

    /// Maps the first image byte to a one-dimensional descriptor;
    /// byte 0xff means "no face".
    struct StubEngine;

    #[async_trait]
    impl FaceEngine for StubEngine {
        async fn descriptor(
            &self,
            image: &[u8],
        ) -> std::result::Result<Option<FaceDescriptor>, String> {
            match image.first() {
                Some(0xff) => Ok(None),
                Some(&b) => Ok(Some(vec![f32::from(b)])),
                None => Err("empty image".to_string()),
            }
        }
    }

    #[test]
    fn test_euclidean() {
        assert!((euclidean(&[0.0, 3.0], &[4.0, 0.0]) - 5.0).abs() < 1e-6);
        assert_eq!(euclidean(&[0.0], &[0.0, 1.0]), f32::INFINITY);
    }

    #[tokio::test]
    async fn test_engine_unavailable_marker() {
        let addon = FaceMatchAddon::new(None, vec![vec![1, 2, 3]]);
        let mut results = vec![
            result_with_avatar("with_avatar", "https://cdn.example/a.png"),
            {
                let mut r = result_with_avatar("no_avatar", "x");
                r.profile.avatar_url = None;
                r
            },
        ];

        addon.run(&ctx(), &mut results).await;

        assert_eq!(
            results[0].profile.face_match_error.as_deref(),
            Some("engine_unavailable")
        );
        assert!(results[1].profile.face_match_error.is_none());
    }

    #[tokio::test]
    async fn test_onion_avatars_skipped() {
        let addon = FaceMatchAddon::new(Some(Arc::new(StubEngine)), vec![vec![10]]);
        let mut results = vec![result_with_avatar("dark", "http://abc.onion/a.png")];

        addon.run(&ctx(), &mut results).await;

        let fm = results[0].profile.face_match.as_ref().expect("face_match");
        assert!(!fm.matched);
        assert_eq!(fm.reason.as_deref(), Some("onion_host"));
    }

    #[tokio::test]
    async fn test_match_and_no_match_via_cached_bytes() {
        let addon = FaceMatchAddon::new(Some(Arc::new(StubEngine)), vec![vec![10]]);
        let context = ctx();
        {
            let mut cache = context.avatar_cache.lock().await;
            // descriptor 10 vs reference 10: distance 0 -> match
            cache.insert("https://cdn.example/close.png".to_string(), vec![10u8]);
            // descriptor 200 vs reference 10: distance 190 -> no match
            cache.insert("https://cdn.example/far.png".to_string(), vec![200u8]);
            // 0xff -> no face
            cache.insert("https://cdn.example/empty.png".to_string(), vec![0xffu8]);
        }

        let mut results = vec![
            result_with_avatar("close", "https://cdn.example/close.png"),
            result_with_avatar("far", "https://cdn.example/far.png"),
            result_with_avatar("faceless", "https://cdn.example/empty.png"),
        ];

        addon.run(&context, &mut results).await;

        let close = results[0].profile.face_match.as_ref().expect("close");
        assert!(close.matched);
        assert_eq!(close.distance, Some(0.0));

        let far = results[1].profile.face_match.as_ref().expect("far");
        assert!(!far.matched);

        let faceless = results[2].profile.face_match.as_ref().expect("faceless");
        assert!(!faceless.matched);
        assert_eq!(faceless.reason.as_deref(), Some("no_face"));
    }

    #[tokio::test]
    async fn test_unusable_references_flagged() {
        // Reference has no face (0xff): nothing to compare against.
        let addon = FaceMatchAddon::new(Some(Arc::new(StubEngine)), vec![vec![0xff]]);
        let mut results = vec![result_with_avatar("site", "https://cdn.example/a.png")];

        addon.run(&ctx(), &mut results).await;

        assert_eq!(
            results[0].profile.face_match_error.as_deref(),
            Some("no_reference_face")
        );
    }
}
