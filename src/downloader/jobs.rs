// In-memory job tracking
//
// One writer per job (the transfer driving it), many pollers. Lookups never
// fail: unknown ids read back as `JobStatus::Unknown`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use super::models::{Job, JobStatus, ProgressEvent, ProgressStatus};
use super::traits::ProgressSink;

/// Synchronized key-value store of job progress records
pub trait JobStore: Send + Sync {
    /// Start (or restart) tracking a job
    fn create(&self, job_id: &str);

    /// Record transfer progress. Ignored when the total size is unknown.
    fn on_progress(
        &self,
        job_id: &str,
        downloaded: u64,
        total: Option<u64>,
        speed: Option<f64>,
        eta: Option<u64>,
    );

    /// Provider reported a finished transfer
    fn on_finished(&self, job_id: &str);

    /// Final file located; job is done
    fn complete(&self, job_id: &str, file_name: &str);

    /// Job failed; percent is left where progress last put it
    fn fail(&self, job_id: &str, message: &str);

    fn get(&self, job_id: &str) -> Job;

    /// Drop records not touched within `max_age`; returns how many were removed
    fn prune(&self, max_age: Duration) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Records are only replaced field-wise under the write lock; poisoned data stays consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Job>> {
        self.jobs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Job>> {
        self.jobs.write().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, job_id: &str, f: impl FnOnce(&mut Job)) {
        let mut jobs = self.write();
        let job = jobs
            .entry(job_id.to_string())
            .or_insert_with(|| Job::starting(job_id));
        f(job);
        job.updated_at = Some(Instant::now());
    }
}

impl JobStore for InMemoryJobStore {
    fn create(&self, job_id: &str) {
        self.write().insert(job_id.to_string(), Job::starting(job_id));
    }

    fn on_progress(
        &self,
        job_id: &str,
        downloaded: u64,
        total: Option<u64>,
        speed: Option<f64>,
        eta: Option<u64>,
    ) {
        let total = match total {
            Some(t) if t > 0 => t,
            _ => return,
        };
        // Estimated totals can undershoot the bytes actually received
        let percent = round_one_decimal((downloaded as f64 / total as f64 * 100.0).min(100.0));

        self.update(job_id, |job| {
            job.status = JobStatus::Downloading;
            job.percent = percent;
            job.speed_bytes_per_sec = speed.filter(|s| *s >= 0.0).map(|s| s.round() as u64);
            job.eta_seconds = eta;
        });
    }

    fn on_finished(&self, job_id: &str) {
        self.update(job_id, |job| {
            job.status = JobStatus::Finished;
            job.percent = 100.0;
            job.speed_bytes_per_sec = None;
            job.eta_seconds = None;
        });
    }

    fn complete(&self, job_id: &str, file_name: &str) {
        self.update(job_id, |job| {
            job.status = JobStatus::Finished;
            job.percent = 100.0;
            job.speed_bytes_per_sec = None;
            job.eta_seconds = None;
            job.result_path = Some(file_name.to_string());
            job.error = None;
        });
    }

    fn fail(&self, job_id: &str, message: &str) {
        self.update(job_id, |job| {
            job.status = JobStatus::Failed;
            job.speed_bytes_per_sec = None;
            job.eta_seconds = None;
            job.error = Some(message.to_string());
        });
    }

    fn get(&self, job_id: &str) -> Job {
        self.read().get(job_id).cloned().unwrap_or_else(Job::unknown)
    }

    fn prune(&self, max_age: Duration) -> usize {
        let mut jobs = self.write();
        let before = jobs.len();
        jobs.retain(|_, job| job.updated_at.map_or(false, |t| t.elapsed() <= max_age));
        let removed = before - jobs.len();
        if removed > 0 {
            debug!(removed, "pruned expired jobs");
        }
        removed
    }

    fn len(&self) -> usize {
        self.read().len()
    }
}

fn round_one_decimal(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Forwards provider progress events for one job into a `JobStore`
pub struct JobProgressSink {
    job_id: String,
    store: Arc<dyn JobStore>,
}

impl JobProgressSink {
    pub fn new(job_id: impl Into<String>, store: Arc<dyn JobStore>) -> Self {
        Self {
            job_id: job_id.into(),
            store,
        }
    }
}

impl ProgressSink for JobProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event.status {
            ProgressStatus::Downloading => self.store.on_progress(
                &self.job_id,
                event.downloaded,
                event.total,
                event.speed,
                event.eta,
            ),
            ProgressStatus::Finished => self.store.on_finished(&self.job_id),
        }
    }
}
