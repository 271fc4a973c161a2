//! Rate and concurrency control for outbound requests.
//!
//! Two layers guard every probe: a global semaphore capping concurrent
//! requests across the whole engine, then a per-host token bucket that
//! paces requests to any single site. Acquisition order is global
//! first, then host; both are released when the returned permit drops.

use crate::error::{Result, ScanError};
use seeker_core::ScanningConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use url::Url;

/// Permit for one outbound request.
///
/// Dropping it releases the global concurrency slot. Bucket tokens are
/// consumed, not held, so there is nothing to give back per host.
#[derive(Debug)]
pub struct RatePermit {
    _global: OwnedSemaphorePermit,
}

#[derive(Debug)]
struct HostBucket {
    tokens: f64,
    last_refill: Instant,
}

/// Global semaphore plus per-host token buckets.
pub struct RateController {
    global: Arc<Semaphore>,
    buckets: Mutex<HashMap<String, HostBucket>>,
    rate_per_sec: f64,
    burst: f64,
    acquire_deadline: Duration,
}

impl RateController {
    /// Build a controller from scan configuration.
    #[must_use]
    pub fn new(config: &ScanningConfig) -> Self {
        Self {
            global: Arc::new(Semaphore::new(config.max_concurrency)),
            buckets: Mutex::new(HashMap::new()),
            rate_per_sec: config.host_rate_per_sec,
            burst: f64::from(config.host_burst),
            acquire_deadline: Duration::from_secs(config.acquire_deadline_secs),
        }
    }

    /// Acquire permits for one request to `url`.
    ///
    /// Suspends until the global slot and a host token are both
    /// available, or fails with a timeout once the scan-wide acquire
    /// deadline elapses.
    ///
    /// # Errors
    /// Returns [`ScanError::AcquireTimeout`] on deadline,
    /// [`ScanError::MissingHost`] for host-less URLs.
    pub async fn acquire(&self, url: &Url) -> Result<RatePermit> {
        let host = url
            .host_str()
            .ok_or_else(|| ScanError::MissingHost {
                url: url.to_string(),
            })?
            .to_lowercase();

        tokio::time::timeout(self.acquire_deadline, self.acquire_inner(&host))
            .await
            .map_err(|_| ScanError::AcquireTimeout {
                host,
                deadline: self.acquire_deadline,
            })?
    }

    async fn acquire_inner(&self, host: &str) -> Result<RatePermit> {
        let global = self
            .global
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ScanError::Cancelled)?;

        loop {
            let wait = {
                let mut buckets = self.buckets.lock().await;
                let now = Instant::now();
                let bucket = buckets.entry(host.to_string()).or_insert(HostBucket {
                    tokens: self.burst,
                    last_refill: now,
                });

                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.rate_per_sec).min(self.burst);
                bucket.last_refill = now;

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    None
                } else {
                    Some(Duration::from_secs_f64(
                        (1.0 - bucket.tokens) / self.rate_per_sec,
                    ))
                }
            };

            match wait {
                None => return Ok(RatePermit { _global: global }),
                Some(wait) => tokio::time::sleep(wait).await,
            }
        }
    }

    /// Slots currently available under the global cap (for tests and
    /// introspection).
    #[must_use]
    pub fn available_global(&self) -> usize {
        self.global.available_permits()
    }
}
