//! Job manager: submit, poll, cancel.
//!
//! `submit` creates a job and spawns its runner: the scan engine
//! streams results into the job record, the addon pipeline enriches
//! the accumulated set, and the job turns terminal. Only an
//! engine-internal invariant violation fails a job; per-provider
//! errors stay inside their results.

use crate::error::{JobError, Result};
use crate::job::{JobHandle, JobView};
use crate::store::JobStore;
use seeker_addons::{AddonPipeline, FaceEngine, FaceMatchAddon};
use seeker_core::{AppConfig, JobId, Username};
use seeker_scanner::engine::ResultSink;
use seeker_scanner::ScanEngine;
use std::sync::Arc;
use tracing::{info, warn};

/// Creates jobs, drives them to completion, and serves pollers.
pub struct JobManager {
    engine: Arc<ScanEngine>,
    store: Arc<JobStore>,
    config: AppConfig,
    face_engine: Option<Arc<dyn FaceEngine>>,
}

impl JobManager {
    /// Build a manager over an engine.
    #[must_use]
    pub fn new(engine: Arc<ScanEngine>, config: AppConfig) -> Self {
        let store = Arc::new(JobStore::new(&config.jobs));
        Self {
            engine,
            store,
            config,
            face_engine: None,
        }
    }

    /// Install a face engine for `face_match` enrichment.
    #[must_use]
    pub fn with_face_engine(mut self, engine: Arc<dyn FaceEngine>) -> Self {
        self.face_engine = Some(engine);
        self
    }

    /// Create a job and start its scan.
    ///
    /// `providers` selects a subset (unknown names silently dropped;
    /// empty or `None` means all). `references` are raw reference
    /// images enabling the face-match addon.
    ///
    /// Must be called within a tokio runtime.
    pub fn submit(
        &self,
        username: Username,
        providers: Option<Vec<String>>,
        references: Vec<Vec<u8>>,
    ) -> JobId {
        let providers_count = self.engine.fanout(providers.as_deref());
        let job = JobHandle::new(username, providers_count);
        let job_id = job.id().clone();
        self.store.insert(job.clone());

        info!(
            job_id = %job_id,
            username = %job.username(),
            providers = providers_count,
            "submitted scan job"
        );

        let engine = self.engine.clone();
        let addons_config = self.config.addons.clone();
        let face_engine = self.face_engine.clone();

        tokio::spawn(async move {
            job.start();

            let cancel = job.cancel_token();
            let sink_job = job.clone();
            let sink: ResultSink = Arc::new(move |result| sink_job.append_result(result));

            let username = job.username().clone();
            let mut results = engine
                .scan(&username, providers.as_deref(), cancel.clone(), Some(sink))
                .await;

            if cancel.is_cancelled() {
                job.finalize_failed("cancelled");
                return;
            }

            if results.len() != job.providers_count() {
                warn!(
                    job_id = %job.id(),
                    expected = job.providers_count(),
                    actual = results.len(),
                    "scan produced an unexpected result count"
                );
                job.finalize_failed("internal: result count mismatch");
                return;
            }

            let face = if references.is_empty() {
                None
            } else {
                Some(FaceMatchAddon::new(face_engine, references))
            };
            let pipeline = AddonPipeline::standard(addons_config, engine.limiter(), face);
            pipeline.run(&mut results).await;

            job.finalize_done(results);
            info!(job_id = %job.id(), "scan job done");
        });

        job_id
    }

    /// Poll a job, truncating results to `limit`.
    pub fn get(&self, job_id: &JobId, limit: Option<usize>) -> Result<JobView> {
        self.store
            .get(job_id)
            .map(|job| job.view(limit))
            .ok_or_else(|| JobError::NotFound {
                job_id: job_id.as_str().to_string(),
            })
    }

    /// Cancel a job's outstanding probes.
    pub fn cancel(&self, job_id: &JobId) -> Result<()> {
        let job = self.store.get(job_id).ok_or_else(|| JobError::NotFound {
            job_id: job_id.as_str().to_string(),
        })?;
        job.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobState;
    use async_trait::async_trait;
    use seeker_core::{Profile, ProviderResult, ResultStatus};
    use seeker_registry::{ProviderLoader, ProviderRegistry};
    use seeker_scanner::{ProbeContext, Prober};
    use std::time::Duration;

    struct SlowProber {
        name: String,
        delay: Duration,
        status: ResultStatus,
    }

    #[async_trait]
    impl Prober for SlowProber {
        fn name(&self) -> &str {
            &self.name
        }

        async fn check(&self, _ctx: &ProbeContext, username: &Username) -> ProviderResult {
            tokio::time::sleep(self.delay).await;
            ProviderResult {
                provider: self.name.clone(),
                username: username.as_str().to_string(),
                url: format!("https://{}.test/{}", self.name, username.as_str()),
                status: self.status,
                http_status: Some(200),
                elapsed_ms: self.delay.as_millis().try_into().unwrap_or(0),
                error: None,
                profile: Profile::default(),
                timestamp: chrono::Utc::now(),
            }
        }
    }

    fn manager_with_probers(probers: Vec<Arc<dyn Prober>>) -> JobManager {
        let code_names = probers.iter().map(|p| p.name().to_string()).collect();
        let registry = Arc::new(
            ProviderRegistry::load_from(
                &ProviderLoader::new("/nonexistent/providers.yaml"),
                code_names,
            )
            .expect("load registry"),
        );

        let mut config = AppConfig::default();
        config.proxy.socks_url = None;
        config.scanning.max_concurrency = 16;

        let engine =
            Arc::new(ScanEngine::new(&config, registry, probers).expect("build engine"));
        JobManager::new(engine, config)
    }

    fn slow_fleet(n: usize, delay: Duration) -> Vec<Arc<dyn Prober>> {
        (0..n)
            .map(|i| {
                Arc::new(SlowProber {
                    name: format!("p{i:02}"),
                    delay,
                    status: ResultStatus::Found,
                }) as Arc<dyn Prober>
            })
            .collect()
    }

    async fn wait_until<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_submit_poll_complete() {
        let manager = manager_with_probers(slow_fleet(4, Duration::from_millis(20)));
        let username = Username::new("alice").expect("valid username");

        let job_id = manager.submit(username, None, Vec::new());

        assert!(
            wait_until(
                || manager
                    .get(&job_id, Some(0))
                    .is_ok_and(|v| v.state == JobState::Done),
                Duration::from_secs(10),
            )
            .await
        );

        let view = manager.get(&job_id, None).expect("job view");
        assert_eq!(view.providers_count, 4);
        assert_eq!(view.results_count, 4);
        assert_eq!(view.found_count, 4);
        assert_eq!(view.results.len(), 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_partial_polling_with_limit() {
        // Ten providers, staggered delays: poll mid-flight.
        let probers: Vec<Arc<dyn Prober>> = (0..10)
            .map(|i| {
                Arc::new(SlowProber {
                    name: format!("p{i:02}"),
                    delay: Duration::from_millis(if i < 5 { 10 } else { 400 }),
                    status: ResultStatus::Found,
                }) as Arc<dyn Prober>
            })
            .collect();
        let manager = manager_with_probers(probers);
        let username = Username::new("alice").expect("valid username");

        let job_id = manager.submit(username, None, Vec::new());

        // Wait until at least 3 results streamed in but the job is
        // still running.
        assert!(
            wait_until(
                || manager.get(&job_id, Some(0)).is_ok_and(|v| v.results_count >= 3),
                Duration::from_secs(10),
            )
            .await
        );

        let partial = manager.get(&job_id, Some(3)).expect("partial view");
        assert!(partial.results_count >= 3);
        assert_eq!(partial.results.len(), 3);

        assert!(
            wait_until(
                || manager
                    .get(&job_id, Some(0))
                    .is_ok_and(|v| v.state == JobState::Done),
                Duration::from_secs(10),
            )
            .await
        );

        let full = manager.get(&job_id, None).expect("full view");
        assert_eq!(full.results.len(), 10);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancel_running_job() {
        let manager = manager_with_probers(slow_fleet(3, Duration::from_secs(30)));
        let username = Username::new("alice").expect("valid username");

        let job_id = manager.submit(username, None, Vec::new());

        assert!(
            wait_until(
                || manager
                    .get(&job_id, Some(0))
                    .is_ok_and(|v| v.state == JobState::Running),
                Duration::from_secs(5),
            )
            .await
        );

        manager.cancel(&job_id).expect("cancel");

        assert!(
            wait_until(
                || manager
                    .get(&job_id, Some(0))
                    .is_ok_and(|v| v.state == JobState::Failed),
                Duration::from_secs(10),
            )
            .await
        );

        let view = manager.get(&job_id, None).expect("job view");
        assert_eq!(view.error.as_deref(), Some("cancelled"));

        // Cancellation safety: nothing lands after the terminal state.
        let count = view.results_count;
        tokio::time::sleep(Duration::from_millis(200)).await;
        let later = manager.get(&job_id, None).expect("job view");
        assert_eq!(later.results_count, count);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unknown_job_is_not_found() {
        let manager = manager_with_probers(slow_fleet(1, Duration::from_millis(1)));
        let missing = JobId::generate();

        assert!(matches!(
            manager.get(&missing, None),
            Err(JobError::NotFound { .. })
        ));
        assert!(matches!(
            manager.cancel(&missing),
            Err(JobError::NotFound { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_subset_fanout_recorded() {
        let manager = manager_with_probers(slow_fleet(5, Duration::from_millis(5)));
        let username = Username::new("alice").expect("valid username");

        let subset = vec!["p00".to_string(), "p03".to_string(), "nope".to_string()];
        let job_id = manager.submit(username, Some(subset), Vec::new());

        let view = manager.get(&job_id, Some(0)).expect("job view");
        assert_eq!(view.providers_count, 2);
    }
}
