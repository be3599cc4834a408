//! Legal job transitions and idempotent job creation on top of a [`JobStore`].

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use caseflow_core::{CaseId, Job, JobId, JobStage, JobState, TransitionError};

use super::store::JobStore;
use crate::error::StoreError;

/// Attempts at a conditional write before giving up on a hot row.
const MAX_ADVANCE_ATTEMPTS: usize = 16;

/// Failure of a state-machine operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// A duplicate was rejected under a uniqueness scope other than per-case.
    #[error("idempotency_key_conflict_across_case: {constraint}")]
    IdempotencyConflict { constraint: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of [`JobStateMachine::create_with_idempotency`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub job: Job,
    /// `false` when an existing job was returned unchanged.
    pub created: bool,
}

/// Owns every job state change.
#[derive(Clone)]
pub struct JobStateMachine {
    store: Arc<dyn JobStore>,
}

impl JobStateMachine {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub async fn get(&self, job_id: JobId) -> Result<Job, JobError> {
        self.store.get(job_id).await?.ok_or(JobError::NotFound(job_id))
    }

    /// Create a queued job unless one already exists for `(case_id, idempotency_key)`.
    ///
    /// Concurrent duplicates converge: the loser of the insert race re-reads and
    /// returns the winner's row.
    pub async fn create_with_idempotency(
        &self,
        case_id: CaseId,
        stage: JobStage,
        idempotency_key: &str,
    ) -> Result<Admission, JobError> {
        if let Some(job) = self.store.find_by_idempotency_key(case_id, idempotency_key).await? {
            debug!(job_id = %job.job_id, case_id = %case_id, "idempotent replay");
            return Ok(Admission { job, created: false });
        }

        let job = Job::queued(case_id, stage, idempotency_key, Utc::now());
        match self.store.insert(&job).await {
            Ok(()) => {
                info!(job_id = %job.job_id, case_id = %case_id, stage = %job.stage, "job queued");
                Ok(Admission { job, created: true })
            }
            Err(StoreError::UniqueViolation { constraint }) => {
                match self.store.find_by_idempotency_key(case_id, idempotency_key).await? {
                    Some(existing) => {
                        debug!(job_id = %existing.job_id, case_id = %case_id, "lost admission race");
                        Ok(Admission {
                            job: existing,
                            created: false,
                        })
                    }
                    None => {
                        warn!(case_id = %case_id, constraint = %constraint, "idempotency key rejected outside case scope");
                        Err(JobError::IdempotencyConflict { constraint })
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Move a job to `target`, applying the failure/terminal side effects.
    ///
    /// Atomic per job: the write is conditional on the state observed when the
    /// transition was validated, and a lost race re-validates against the new row.
    pub async fn advance(
        &self,
        job_id: JobId,
        target: JobState,
        error_code: Option<String>,
    ) -> Result<Job, JobError> {
        for attempt in 1..=MAX_ADVANCE_ATTEMPTS {
            let current = self.get(job_id).await?;
            let next = current.transitioned(target, error_code.clone(), Utc::now())?;

            if self.store.compare_and_swap(&current, &next).await? {
                info!(
                    job_id = %job_id,
                    from = %current.state,
                    to = %next.state,
                    retry_count = next.retry_count,
                    error_code = next.error_code.as_deref().unwrap_or(""),
                    "job advanced"
                );
                return Ok(next);
            }
            debug!(job_id = %job_id, attempt, "concurrent advance, re-reading");
        }

        Err(StoreError::Contention(format!("job {job_id} kept changing during advance")).into())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::jobs::store::{InMemoryJobStore, QueueStats};

    fn machine() -> JobStateMachine {
        JobStateMachine::new(InMemoryJobStore::arc())
    }

    async fn job_in(machine: &JobStateMachine, state: JobState) -> Job {
        let admission = machine
            .create_with_idempotency(CaseId::new(), JobStage::inference(), "k")
            .await
            .unwrap();
        let id = admission.job.job_id;
        let path: &[JobState] = match state {
            JobState::Queued => &[],
            JobState::Running => &[JobState::Running],
            JobState::Succeeded => &[JobState::Running, JobState::Succeeded],
            JobState::Failed => &[JobState::Failed],
            JobState::DeadLetter => &[JobState::Failed, JobState::DeadLetter],
        };
        for step in path {
            machine.advance(id, *step, None).await.unwrap();
        }
        machine.get(id).await.unwrap()
    }

    #[tokio::test]
    async fn replays_return_the_same_job() {
        let machine = machine();
        let case_id = CaseId::new();

        let first = machine
            .create_with_idempotency(case_id, JobStage::inference(), "idem-1")
            .await
            .unwrap();
        let second = machine
            .create_with_idempotency(case_id, JobStage::inference(), "idem-1")
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.job, second.job);
        assert_eq!(first.job.state, JobState::Queued);
    }

    #[tokio::test]
    async fn same_key_on_two_cases_makes_two_jobs() {
        let machine = machine();
        let a = machine
            .create_with_idempotency(CaseId::new(), JobStage::inference(), "shared")
            .await
            .unwrap();
        let b = machine
            .create_with_idempotency(CaseId::new(), JobStage::inference(), "shared")
            .await
            .unwrap();
        assert!(a.created && b.created);
        assert_ne!(a.job.job_id, b.job.job_id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicates_converge_to_one_row() {
        let store = InMemoryJobStore::arc();
        let machine = JobStateMachine::new(store.clone());
        let case_id = CaseId::new();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let machine = machine.clone();
            handles.push(tokio::spawn(async move {
                machine
                    .create_with_idempotency(case_id, JobStage::inference(), "same-key")
                    .await
            }));
        }

        let mut ids = Vec::new();
        let mut created = 0;
        for handle in handles {
            let admission = handle.await.unwrap().unwrap();
            created += usize::from(admission.created);
            ids.push(admission.job.job_id);
        }

        assert_eq!(created, 1);
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.stats().await.unwrap().total(), 1);
    }

    #[tokio::test]
    async fn every_pair_follows_the_table() {
        for from in JobState::ALL {
            for to in JobState::ALL {
                let machine = machine();
                let job = job_in(&machine, from).await;
                let result = machine.advance(job.job_id, to, Some("boom".into())).await;

                if from.can_transition_to(to) {
                    let next = result.unwrap();
                    assert_eq!(next.state, to);
                } else {
                    assert_eq!(
                        result.unwrap_err(),
                        JobError::InvalidTransition(TransitionError { from, to })
                    );
                    let stored = machine.get(job.job_id).await.unwrap();
                    assert_eq!(stored, job, "{from} -> {to} must leave the row untouched");
                }
            }
        }
    }

    #[tokio::test]
    async fn failure_side_effects() {
        let machine = machine();
        let job = job_in(&machine, JobState::Running).await;

        let failed = machine.advance(job.job_id, JobState::Failed, None).await.unwrap();
        assert_eq!(failed.retry_count, 1);
        assert_eq!(failed.error_code.as_deref(), Some("unknown_failure"));

        let requeued = machine.advance(job.job_id, JobState::Queued, None).await.unwrap();
        assert_eq!(requeued.retry_count, 1);
        assert_eq!(requeued.error_code.as_deref(), Some("unknown_failure"));

        let failed = machine
            .advance(job.job_id, JobState::Failed, Some("qc_blocked".into()))
            .await
            .unwrap();
        assert_eq!(failed.retry_count, 2);
        assert_eq!(failed.error_code.as_deref(), Some("qc_blocked"));

        let dead = machine.advance(job.job_id, JobState::DeadLetter, None).await.unwrap();
        assert_eq!(dead.error_code, None);
        assert_eq!(dead.retry_count, 2);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let machine = machine();
        let id = JobId::new();
        assert_eq!(
            machine.advance(id, JobState::Running, None).await.unwrap_err(),
            JobError::NotFound(id)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_advances_only_produce_valid_sequences() {
        let machine = machine();
        let job = job_in(&machine, JobState::Running).await;

        // succeeded and failed race out of running; exactly one may win
        let a = {
            let m = machine.clone();
            tokio::spawn(async move { m.advance(job.job_id, JobState::Succeeded, None).await })
        };
        let b = {
            let m = machine.clone();
            tokio::spawn(async move { m.advance(job.job_id, JobState::Failed, None).await })
        };
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        let stored = machine.get(job.job_id).await.unwrap();
        match (a, b) {
            (Ok(_), Err(JobError::InvalidTransition(_))) => {
                assert_eq!(stored.state, JobState::Succeeded);
                assert_eq!(stored.retry_count, 0);
            }
            (Err(JobError::InvalidTransition(_)), Ok(_)) => {
                assert_eq!(stored.state, JobState::Failed);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    /// Emulates a deployment whose schema enforces key uniqueness across cases.
    struct GlobalKeyStore {
        inner: InMemoryJobStore,
    }

    #[async_trait::async_trait]
    impl JobStore for GlobalKeyStore {
        async fn insert(&self, job: &Job) -> Result<(), StoreError> {
            // the per-case lookup never sees the other case's row
            if self.inner.stats().await?.total() > 0 {
                return Err(StoreError::UniqueViolation {
                    constraint: "uq_jobs_idempotency_key".into(),
                });
            }
            self.inner.insert(job).await
        }
        async fn get(&self, job_id: JobId) -> Result<Option<Job>, StoreError> {
            self.inner.get(job_id).await
        }
        async fn find_by_idempotency_key(
            &self,
            case_id: CaseId,
            key: &str,
        ) -> Result<Option<Job>, StoreError> {
            self.inner.find_by_idempotency_key(case_id, key).await
        }
        async fn compare_and_swap(&self, current: &Job, next: &Job) -> Result<bool, StoreError> {
            self.inner.compare_and_swap(current, next).await
        }
        async fn claim_oldest_queued(&self, now: DateTime<Utc>) -> Result<Option<Job>, StoreError> {
            self.inner.claim_oldest_queued(now).await
        }
        async fn stats(&self) -> Result<QueueStats, StoreError> {
            self.inner.stats().await
        }
    }

    #[tokio::test]
    async fn violation_outside_case_scope_is_a_conflict() {
        let machine = JobStateMachine::new(Arc::new(GlobalKeyStore {
            inner: InMemoryJobStore::new(),
        }));
        machine
            .create_with_idempotency(CaseId::new(), JobStage::inference(), "k")
            .await
            .unwrap();

        let err = machine
            .create_with_idempotency(CaseId::new(), JobStage::inference(), "k")
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::IdempotencyConflict { .. }));
    }
}
