//! Bounded process-local job store.
//!
//! Retention is LRU over a fixed capacity plus a TTL after a job turns
//! terminal, whichever evicts first. One global lock guards the
//! id-to-job map and is held only for insert, lookup, and eviction;
//! result appends go through the per-job lock instead.

use crate::job::JobHandle;
use seeker_core::{JobId, JobsConfig};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

struct StoreInner {
    jobs: HashMap<String, JobHandle>,
    // Least-recently-used at the front.
    order: Vec<String>,
}

/// Bounded LRU + TTL job store.
pub struct JobStore {
    inner: Mutex<StoreInner>,
    capacity: usize,
    retention: Duration,
}

impl JobStore {
    /// Build a store from configuration.
    #[must_use]
    pub fn new(config: &JobsConfig) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                jobs: HashMap::new(),
                order: Vec::new(),
            }),
            capacity: config.capacity.max(1),
            retention: Duration::from_secs(config.retention_secs),
        }
    }

    /// Insert a job, evicting expired and over-capacity entries.
    pub fn insert(&self, job: JobHandle) {
        let mut inner = self.inner.lock().expect("acquire store lock");

        Self::evict_expired(&mut inner, self.retention);

        while inner.order.len() >= self.capacity {
            let oldest = inner.order.remove(0);
            inner.jobs.remove(&oldest);
            debug!(job_id = %oldest, "evicted job at capacity");
        }

        let key = job.id().as_str().to_string();
        inner.order.push(key.clone());
        inner.jobs.insert(key, job);
    }

    /// Look up a job, refreshing its recency. Expired jobs read as
    /// absent.
    #[must_use]
    pub fn get(&self, job_id: &JobId) -> Option<JobHandle> {
        let mut inner = self.inner.lock().expect("acquire store lock");

        Self::evict_expired(&mut inner, self.retention);

        let key = job_id.as_str().to_string();
        let job = inner.jobs.get(&key).cloned()?;

        if let Some(pos) = inner.order.iter().position(|k| k == &key) {
            inner.order.remove(pos);
            inner.order.push(key);
        }

        Some(job)
    }

    /// Number of retained jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("acquire store lock").jobs.len()
    }

    /// True when no job is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_expired(inner: &mut StoreInner, retention: Duration) {
        let now = Instant::now();
        let expired: Vec<String> = inner
            .order
            .iter()
            .filter(|key| {
                inner.jobs.get(*key).is_some_and(|job| {
                    job.terminal_at()
                        .is_some_and(|at| now.duration_since(at) >= retention)
                })
            })
            .cloned()
            .collect();

        for key in expired {
            inner.jobs.remove(&key);
            inner.order.retain(|k| k != &key);
            debug!(job_id = %key, "evicted terminal job past retention");
        }
    }
}
