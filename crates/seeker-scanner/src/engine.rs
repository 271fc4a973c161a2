//! Scan engine: fan-out, streaming, deadlines, cancellation.
//!
//! The engine resolves the provider list from a registry snapshot,
//! submits one task per provider under the rate controller, and streams
//! each completed result to an optional sink as it lands. Results
//! appear in completion order, not provider order. A panicking driver
//! is confined to its own result; the scan itself never fails.

use crate::client::ClientFactory;
use crate::error::Result;
use crate::limiter::RateController;
use crate::probe::{GenericProber, ProbeContext, Prober};
use seeker_core::{AppConfig, ProviderResult, Username};
use seeker_registry::{ProviderKind, ProviderRegistry, RegistrySnapshot};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Callback receiving each result as it completes.
pub type ResultSink = Arc<dyn Fn(ProviderResult) + Send + Sync>;

/// Grace period for cooperative exits after the job deadline fires.
const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Fans a username out across providers.
pub struct ScanEngine {
    registry: Arc<ProviderRegistry>,
    code_drivers: HashMap<String, Arc<dyn Prober>>,
    clients: Arc<ClientFactory>,
    limiter: Arc<RateController>,
    job_deadline: Duration,
}

impl ScanEngine {
    /// Build an engine over a registry and a set of code drivers.
    ///
    /// # Errors
    /// Returns error when the HTTP clients cannot be constructed.
    pub fn new(
        config: &AppConfig,
        registry: Arc<ProviderRegistry>,
        drivers: Vec<Arc<dyn Prober>>,
    ) -> Result<Self> {
        let code_drivers = drivers
            .into_iter()
            .map(|d| (d.name().to_string(), d))
            .collect();

        Ok(Self {
            registry,
            code_drivers,
            clients: Arc::new(ClientFactory::new(config)?),
            limiter: Arc::new(RateController::new(&config.scanning)),
            job_deadline: Duration::from_secs(config.scanning.job_deadline_secs),
        })
    }

    /// The registry this engine scans from.
    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// The rate controller, shared with the addon pipeline so avatar
    /// fetches obey the same per-host pacing as probes.
    #[must_use]
    pub fn limiter(&self) -> Arc<RateController> {
        self.limiter.clone()
    }

    /// Resolve probers for a scan, in registry order.
    ///
    /// Unknown subset names are silently dropped; an empty or missing
    /// subset selects every registered provider.
    #[must_use]
    pub fn resolve(
        &self,
        snapshot: &RegistrySnapshot,
        subset: Option<&[String]>,
    ) -> Vec<Arc<dyn Prober>> {
        let wanted = |name: &str| match subset {
            Some(names) if !names.is_empty() => names.iter().any(|n| n.as_str() == name),
            _ => true,
        };

        snapshot
            .entries()
            .iter()
            .filter(|entry| wanted(entry.name()))
            .filter_map(|entry| match entry.kind() {
                ProviderKind::Data(descriptor) => Some(
                    Arc::new(GenericProber::new(descriptor.clone())) as Arc<dyn Prober>
                ),
                ProviderKind::Code => {
                    let driver = self.code_drivers.get(entry.name()).cloned();
                    if driver.is_none() {
                        warn!(provider = %entry.name(), "registered code driver has no implementation");
                    }
                    driver
                }
            })
            .collect()
    }

    /// Number of providers a scan over `subset` would cover.
    #[must_use]
    pub fn fanout(&self, subset: Option<&[String]>) -> usize {
        self.resolve(&self.registry.snapshot(), subset).len()
    }

    /// Scan one username across the resolved providers.
    ///
    /// Each result is passed to `on_result` as it completes and also
    /// collected into the returned vector. Cancelling the token stops
    /// outstanding probes cooperatively; their results are recorded as
    /// `error: "cancelled"`.
    pub async fn scan(
        &self,
        username: &Username,
        subset: Option<&[String]>,
        cancel: CancellationToken,
        on_result: Option<ResultSink>,
    ) -> Vec<ProviderResult> {
        let snapshot = self.registry.snapshot();
        let probers = self.resolve(&snapshot, subset);
        debug!(
            username = %username,
            providers = probers.len(),
            "starting scan fan-out"
        );

        let ctx = ProbeContext {
            clients: self.clients.clone(),
            limiter: self.limiter.clone(),
            cancel: cancel.clone(),
        };

        let mut tasks: JoinSet<ProviderResult> = JoinSet::new();
        let mut task_names: HashMap<tokio::task::Id, String> = HashMap::new();

        for prober in probers {
            let ctx = ctx.clone();
            let username = username.clone();
            let task_cancel = cancel.clone();
            let name = prober.name().to_string();
            let per_provider = prober.timeout() * 2;

            let handle = tasks.spawn(async move {
                tokio::select! {
                    () = task_cancel.cancelled() => ProviderResult::error(
                        prober.name(),
                        username.as_str(),
                        String::new(),
                        0,
                        "cancelled",
                    ),
                    checked = tokio::time::timeout(per_provider, prober.check(&ctx, &username)) => {
                        checked.unwrap_or_else(|_| ProviderResult::error(
                            prober.name(),
                            username.as_str(),
                            String::new(),
                            per_provider.as_millis().try_into().unwrap_or(u64::MAX),
                            "timeout",
                        ))
                    }
                }
            });
            task_names.insert(handle.id(), name);
        }

        let deadline = tokio::time::Instant::now() + self.job_deadline;
        let mut results = Vec::with_capacity(task_names.len());
        let deliver = |result: ProviderResult, results: &mut Vec<ProviderResult>| {
            if let Some(sink) = &on_result {
                sink(result.clone());
            }
            results.push(result);
        };

        loop {
            let joined = tokio::time::timeout_at(deadline, tasks.join_next_with_id()).await;
            match joined {
                Ok(None) => break,
                Ok(Some(Ok((id, result)))) => {
                    task_names.remove(&id);
                    deliver(result, &mut results);
                }
                Ok(Some(Err(join_err))) => {
                    let name = task_names
                        .remove(&join_err.id())
                        .unwrap_or_else(|| "unknown".to_string());
                    let message = if join_err.is_panic() {
                        "driver panicked"
                    } else {
                        "cancelled"
                    };
                    warn!(provider = %name, error = %join_err, "probe task failed");
                    deliver(
                        ProviderResult::error(name, username.as_str(), String::new(), 0, message),
                        &mut results,
                    );
                }
                Err(_) => {
                    // Job deadline fired: signal, drain cooperatively,
                    // then abort stragglers.
                    warn!(username = %username, "job deadline reached, cancelling scan");
                    cancel.cancel();

                    while let Ok(Some(joined)) =
                        tokio::time::timeout(CANCEL_GRACE, tasks.join_next_with_id()).await
                    {
                        match joined {
                            Ok((id, result)) => {
                                task_names.remove(&id);
                                deliver(result, &mut results);
                            }
                            Err(join_err) => {
                                let name = task_names
                                    .remove(&join_err.id())
                                    .unwrap_or_else(|| "unknown".to_string());
                                deliver(
                                    ProviderResult::error(
                                        name,
                                        username.as_str(),
                                        String::new(),
                                        0,
                                        "cancelled",
                                    ),
                                    &mut results,
                                );
                            }
                        }
                    }

                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    for (_, name) in task_names.drain() {
                        deliver(
                            ProviderResult::error(
                                name,
                                username.as_str(),
                                String::new(),
                                0,
                                "cancelled",
                            ),
                            &mut results,
                        );
                    }
                    break;
                }
            }
        }

        debug!(
            username = %username,
            results = results.len(),
            "scan fan-out complete"
        );

        results
    }
}
