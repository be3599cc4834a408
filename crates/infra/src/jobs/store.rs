//! Job storage: the trait every backend implements plus the in-memory backend.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use caseflow_core::{CaseId, Job, JobId, JobState};

use crate::db::JOB_IDEMPOTENCY_CONSTRAINT;
use crate::error::StoreError;

/// Job persistence.
///
/// Every mutation after insert goes through [`compare_and_swap`](JobStore::compare_and_swap)
/// or [`claim_oldest_queued`](JobStore::claim_oldest_queued); both are atomic per row.
#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job. A duplicate `(case_id, idempotency_key)` fails with
    /// [`StoreError::UniqueViolation`].
    async fn insert(&self, job: &Job) -> Result<(), StoreError>;

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, StoreError>;

    async fn find_by_idempotency_key(
        &self,
        case_id: CaseId,
        idempotency_key: &str,
    ) -> Result<Option<Job>, StoreError>;

    /// Replace `current` with `next` only if the stored row still has the state and
    /// retry count observed in `current`. Returns `false` when the guard did not hold.
    async fn compare_and_swap(&self, current: &Job, next: &Job) -> Result<bool, StoreError>;

    /// Atomically move the oldest `queued` job to `running` and return it.
    async fn claim_oldest_queued(&self, now: DateTime<Utc>) -> Result<Option<Job>, StoreError>;

    async fn stats(&self) -> Result<QueueStats, StoreError>;
}

/// Job counts per state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queued: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub dead_letter: usize,
}

impl QueueStats {
    pub fn record(&mut self, state: JobState, count: usize) {
        match state {
            JobState::Queued => self.queued += count,
            JobState::Running => self.running += count,
            JobState::Succeeded => self.succeeded += count,
            JobState::Failed => self.failed += count,
            JobState::DeadLetter => self.dead_letter += count,
        }
    }

    pub fn total(&self) -> usize {
        self.queued + self.running + self.succeeded + self.failed + self.dead_letter
    }
}

/// In-memory job store for tests/dev.
///
/// Rows are kept in insertion order so equal `created_at` values still claim FIFO.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<Vec<Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait::async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().await;
        if jobs.iter().any(|j| j.job_id == job.job_id) {
            return Err(StoreError::UniqueViolation {
                constraint: "jobs_pkey".to_string(),
            });
        }
        if jobs
            .iter()
            .any(|j| j.case_id == job.case_id && j.idempotency_key == job.idempotency_key)
        {
            return Err(StoreError::UniqueViolation {
                constraint: JOB_IDEMPOTENCY_CONSTRAINT.to_string(),
            });
        }
        jobs.push(job.clone());
        Ok(())
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, StoreError> {
        let jobs = self.jobs.lock().await;
        Ok(jobs.iter().find(|j| j.job_id == job_id).cloned())
    }

    async fn find_by_idempotency_key(
        &self,
        case_id: CaseId,
        idempotency_key: &str,
    ) -> Result<Option<Job>, StoreError> {
        let jobs = self.jobs.lock().await;
        Ok(jobs
            .iter()
            .find(|j| j.case_id == case_id && j.idempotency_key == idempotency_key)
            .cloned())
    }

    async fn compare_and_swap(&self, current: &Job, next: &Job) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().await;
        let Some(stored) = jobs.iter_mut().find(|j| j.job_id == current.job_id) else {
            return Err(StoreError::NotFound(format!("job {}", current.job_id)));
        };
        if stored.state != current.state || stored.retry_count != current.retry_count {
            return Ok(false);
        }
        *stored = next.clone();
        Ok(true)
    }

    async fn claim_oldest_queued(&self, now: DateTime<Utc>) -> Result<Option<Job>, StoreError> {
        let mut jobs = self.jobs.lock().await;
        // min_by_key keeps the first of equal keys, i.e. insertion order
        let oldest = jobs
            .iter_mut()
            .filter(|j| j.state == JobState::Queued)
            .min_by_key(|j| j.created_at);

        Ok(oldest.map(|job| {
            job.state = JobState::Running;
            job.updated_at = now;
            job.clone()
        }))
    }

    async fn stats(&self) -> Result<QueueStats, StoreError> {
        let jobs = self.jobs.lock().await;
        let mut stats = QueueStats::default();
        for job in jobs.iter() {
            stats.record(job.state, 1);
        }
        Ok(stats)
    }
}
