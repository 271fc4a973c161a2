//! Job records: streamed state, counts, and the polling projection.

use seeker_core::{JobId, ProviderResult, ResultStatus, Username};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created, scan not yet started
    Pending,
    /// Scan in flight; results stream in
    Running,
    /// All probes terminal and addons complete
    Done,
    /// Engine-internal failure or cancellation
    Failed,
}

impl JobState {
    /// Whether the state admits no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Mutable job body, guarded by the per-job lock.
struct JobData {
    state: JobState,
    results: Vec<ProviderResult>,
    found_count: usize,
    failed_count: usize,
    error: Option<String>,
    terminal_at: Option<Instant>,
}

/// Handle to one job; cheap to clone and share.
#[derive(Clone)]
pub struct JobHandle {
    inner: Arc<JobInner>,
}

struct JobInner {
    id: JobId,
    username: Username,
    providers_count: usize,
    cancel: CancellationToken,
    // Per-job lock: appends and reads contend only within this job.
    data: Mutex<JobData>,
}

impl JobHandle {
    /// Create a pending job.
    #[must_use]
    pub fn new(username: Username, providers_count: usize) -> Self {
        Self {
            inner: Arc::new(JobInner {
                id: JobId::generate(),
                username,
                providers_count,
                cancel: CancellationToken::new(),
                data: Mutex::new(JobData {
                    state: JobState::Pending,
                    results: Vec::new(),
                    found_count: 0,
                    failed_count: 0,
                    error: None,
                    terminal_at: None,
                }),
            }),
        }
    }

    /// Job id.
    #[must_use]
    pub fn id(&self) -> &JobId {
        &self.inner.id
    }

    /// The scanned handle.
    #[must_use]
    pub fn username(&self) -> &Username {
        &self.inner.username
    }

    /// Total fanout this job covers.
    #[must_use]
    pub fn providers_count(&self) -> usize {
        self.inner.providers_count
    }

    /// The job's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Signal cancellation. No-op on terminal jobs.
    pub fn cancel(&self) {
        let data = self.inner.data.lock().expect("acquire job lock");
        if !data.state.is_terminal() {
            self.inner.cancel.cancel();
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.inner.data.lock().expect("acquire job lock").state
    }

    /// When the job reached a terminal state, if it has.
    #[must_use]
    pub fn terminal_at(&self) -> Option<Instant> {
        self.inner.data.lock().expect("acquire job lock").terminal_at
    }

    /// Mark the job running. No-op unless pending.
    pub fn start(&self) {
        let mut data = self.inner.data.lock().expect("acquire job lock");
        if data.state == JobState::Pending {
            data.state = JobState::Running;
        }
    }

    /// Append one streamed result. Ignored once the job is terminal,
    /// so no result ever lands after a poller observed the final state.
    pub fn append_result(&self, result: ProviderResult) {
        let mut data = self.inner.data.lock().expect("acquire job lock");
        if data.state.is_terminal() {
            return;
        }
        if data.results.len() >= self.inner.providers_count {
            return;
        }

        match result.status {
            ResultStatus::Found => data.found_count += 1,
            ResultStatus::NotFound
            | ResultStatus::Unknown
            | ResultStatus::Blocked
            | ResultStatus::Error => data.failed_count += 1,
        }
        data.results.push(result);
    }

    /// Install the final (addon-enriched) result set and mark done.
    pub fn finalize_done(&self, results: Vec<ProviderResult>) {
        let mut data = self.inner.data.lock().expect("acquire job lock");
        if data.state.is_terminal() {
            return;
        }

        data.found_count = results
            .iter()
            .filter(|r| r.status == ResultStatus::Found)
            .count();
        data.failed_count = results.len() - data.found_count;
        data.results = results;
        data.state = JobState::Done;
        data.terminal_at = Some(Instant::now());
    }

    /// Mark the job failed with a short error.
    pub fn finalize_failed(&self, error: impl Into<String>) {
        let mut data = self.inner.data.lock().expect("acquire job lock");
        if data.state.is_terminal() {
            return;
        }
        data.state = JobState::Failed;
        data.error = Some(error.into());
        data.terminal_at = Some(Instant::now());
    }

    /// Build the polling projection, truncating results to `limit`.
    ///
    /// `limit = 0` returns counts only.
    #[must_use]
    pub fn view(&self, limit: Option<usize>) -> JobView {
        let data = self.inner.data.lock().expect("acquire job lock");

        let results_total = data.results.len();
        let results = match limit {
            Some(limit) if limit < results_total => data.results[..limit].to_vec(),
            _ => data.results.clone(),
        };

        JobView {
            job_id: self.inner.id.clone(),
            state: data.state,
            username: self.inner.username.as_str().to_string(),
            providers_count: self.inner.providers_count,
            results_count: results_total,
            found_count: data.found_count,
            failed_count: data.failed_count,
            error: data.error.clone(),
            results,
            results_total,
        }
    }
}

/// Serializable job projection returned to pollers.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    /// Opaque job id
    pub job_id: JobId,
    /// Lifecycle state
    pub state: JobState,
    /// Scanned handle
    pub username: String,
    /// Total fanout
    pub providers_count: usize,
    /// Results accumulated so far
    pub results_count: usize,
    /// Results with status `found`
    pub found_count: usize,
    /// Results with any other status
    pub failed_count: usize,
    /// Failure reason, when failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Result records, possibly truncated by the poll limit
    pub results: Vec<ProviderResult>,
    /// Total result count before truncation
    pub results_total: usize,
}
