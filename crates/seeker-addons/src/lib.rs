//! Seeker Addons - Post-scan enrichment pipeline.
//!
//! Addons run after every provider probe is terminal and enrich the
//! accumulated results in place. The pipeline order is fixed:
//! `bio_links` then `avatar_fingerprint` then `avatar_clusters` then
//! `face_match` (the last only when reference images were supplied).
//!
//! Addons are safe-by-default: they only enrich data the scan already
//! discovered, they enforce network safety limits (SSRF, size,
//! timeouts) when they fetch URLs, and a failing addon attaches an
//! error field to the affected result instead of failing the job.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod bio_links;
pub mod clusters;
pub mod error;
pub mod face_match;
pub mod fingerprint;
pub mod net_safety;
pub mod restore;
pub mod reverse_image;

pub use bio_links::BioLinksAddon;
pub use clusters::AvatarClustersAddon;
pub use error::{AddonError, Result};
pub use face_match::{FaceDescriptor, FaceEngine, FaceMatchAddon};
pub use fingerprint::AvatarFingerprintAddon;
pub use net_safety::SafeFetcher;
pub use restore::FaceRestoreClient;
pub use reverse_image::{reverse_image_links, ReverseImageLink};

use async_trait::async_trait;
use seeker_core::{AddonsConfig, ProviderResult};
use seeker_scanner::RateController;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Shared state one pipeline run threads through its addons.
pub struct AddonContext {
    /// Rate controller shared with the scan engine
    pub limiter: Arc<RateController>,
    /// SSRF-guarded fetcher for avatar downloads
    pub fetcher: SafeFetcher,
    /// Pipeline thresholds
    pub config: AddonsConfig,
    /// Raw avatar bytes keyed by URL, populated by the fingerprint
    /// stage and reused by face matching; dropped with the run
    pub avatar_cache: Mutex<HashMap<String, Vec<u8>>>,
}

/// Post-processing enrichment that runs after provider checks.
#[async_trait]
pub trait Addon: Send + Sync {
    /// Addon name, for logging.
    fn name(&self) -> &str;

    /// Mutate results in place.
    async fn run(&self, ctx: &AddonContext, results: &mut Vec<ProviderResult>);
}

/// The ordered addon pipeline.
pub struct AddonPipeline {
    ctx: AddonContext,
    addons: Vec<Box<dyn Addon>>,
}

impl AddonPipeline {
    /// Build the standard pipeline.
    ///
    /// `face_match` is appended only when `face` carries reference
    /// images; an absent engine inside it still runs the addon, which
    /// then marks every candidate result `engine_unavailable`.
    #[must_use]
    pub fn standard(
        config: AddonsConfig,
        limiter: Arc<RateController>,
        face: Option<FaceMatchAddon>,
    ) -> Self {
        let mut addons: Vec<Box<dyn Addon>> = vec![
            Box::new(BioLinksAddon::new()),
            Box::new(AvatarFingerprintAddon::new()),
            Box::new(AvatarClustersAddon::new(config.dhash_max_distance)),
        ];
        if let Some(face) = face {
            addons.push(Box::new(face));
        }

        Self {
            ctx: AddonContext {
                limiter,
                fetcher: SafeFetcher::new(),
                config,
                avatar_cache: Mutex::new(HashMap::new()),
            },
            addons,
        }
    }

    /// Allow loopback and private-range hosts for avatar fetches.
    ///
    /// Intended for scans of self-hosted intranet services; leaves the
    /// SSRF guard on for everything else.
    #[must_use]
    pub fn allow_private_hosts(mut self) -> Self {
        self.ctx.fetcher = SafeFetcher::new().allow_private_hosts();
        self
    }

    /// Run every addon, in order, over the accumulated results.
    pub async fn run(&self, results: &mut Vec<ProviderResult>) {
        for addon in &self.addons {
            debug!(addon = %addon.name(), "running addon");
            addon.run(&self.ctx, results).await;
        }

        let mut cache = self.ctx.avatar_cache.lock().await;
        cache.clear();
    }
}
