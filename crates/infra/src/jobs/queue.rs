//! Queue claimer: hands the oldest queued job to exactly one worker.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use caseflow_core::Job;

use super::store::{JobStore, QueueStats};
use crate::error::StoreError;

#[derive(Clone)]
pub struct QueueClaimer {
    store: Arc<dyn JobStore>,
}

impl QueueClaimer {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Reserve the oldest `queued` job (now `running`), or `None` when idle.
    pub async fn claim_next(&self) -> Result<Option<Job>, StoreError> {
        let claimed = self.store.claim_oldest_queued(Utc::now()).await?;
        if let Some(job) = &claimed {
            debug!(job_id = %job.job_id, case_id = %job.case_id, "job claimed");
        }
        Ok(claimed)
    }

    pub async fn stats(&self) -> Result<QueueStats, StoreError> {
        self.store.stats().await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use caseflow_core::{CaseId, JobStage, JobState};

    use super::*;
    use crate::jobs::{InMemoryJobStore, JobStateMachine};

    #[tokio::test]
    async fn empty_queue_yields_none() {
        let claimer = QueueClaimer::new(InMemoryJobStore::arc());
        assert!(claimer.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claims_in_admission_order() {
        let store = InMemoryJobStore::arc();
        let machine = JobStateMachine::new(store.clone());
        let claimer = QueueClaimer::new(store);

        let mut admitted = Vec::new();
        for i in 0..3 {
            let a = machine
                .create_with_idempotency(CaseId::new(), JobStage::inference(), &format!("k{i}"))
                .await
                .unwrap();
            admitted.push(a.job.job_id);
        }

        for expected in admitted {
            let job = claimer.claim_next().await.unwrap().unwrap();
            assert_eq!(job.job_id, expected);
            assert_eq!(job.state, JobState::Running);
        }
        assert!(claimer.claim_next().await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claimers_never_share_a_job() {
        let store = InMemoryJobStore::arc();
        let machine = JobStateMachine::new(store.clone());
        for i in 0..20 {
            machine
                .create_with_idempotency(CaseId::new(), JobStage::inference(), &format!("k{i}"))
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let claimer = QueueClaimer::new(store.clone());
            handles.push(tokio::spawn(async move {
                let mut mine = Vec::new();
                while let Some(job) = claimer.claim_next().await.unwrap() {
                    mine.push(job.job_id);
                }
                mine
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.await.unwrap() {
                assert!(seen.insert(id), "job {id} claimed twice");
            }
        }
        assert_eq!(seen.len(), 20);

        let stats = QueueClaimer::new(store).stats().await.unwrap();
        assert_eq!((stats.queued, stats.running), (0, 20));
    }
}
