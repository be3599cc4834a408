//! Case and artifact persistence.

pub mod postgres;

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use caseflow_core::{Artifact, ArtifactKind, Case, CaseId, DomainError};

use crate::error::StoreError;

pub use postgres::{PostgresArtifactStore, PostgresCaseStore};

#[async_trait::async_trait]
pub trait CaseStore: Send + Sync {
    async fn insert(&self, case: &Case) -> Result<(), StoreError>;

    async fn get(&self, case_id: CaseId) -> Result<Option<Case>, StoreError>;

    /// Remove a case row. Its artifacts must already be gone.
    async fn delete(&self, case_id: CaseId) -> Result<(), StoreError>;
}

/// Artifact rows are append-only; they are only ever dropped together with their case.
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn insert(&self, artifact: &Artifact) -> Result<(), StoreError>;

    /// Artifacts of `kind` for a case, oldest first (`created_at`, then id).
    async fn list(&self, case_id: CaseId, kind: ArtifactKind) -> Result<Vec<Artifact>, StoreError>;

    async fn delete_for_case(&self, case_id: CaseId) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaseError {
    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error("case not found: {0}")]
    NotFound(CaseId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Case creation and lookup.
#[derive(Clone)]
pub struct CaseService {
    store: Arc<dyn CaseStore>,
}

impl CaseService {
    pub fn new(store: Arc<dyn CaseStore>) -> Self {
        Self { store }
    }

    pub async fn create_case(&self, subject_ref: &str) -> Result<Case, CaseError> {
        let case = Case::open(subject_ref, Utc::now())?;
        self.store.insert(&case).await?;
        info!(case_id = %case.case_id, "case opened");
        Ok(case)
    }

    pub async fn get_case(&self, case_id: CaseId) -> Result<Case, CaseError> {
        self.store.get(case_id).await?.ok_or(CaseError::NotFound(case_id))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCaseStore {
    cases: Mutex<Vec<Case>>,
}

impl InMemoryCaseStore {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait::async_trait]
impl CaseStore for InMemoryCaseStore {
    async fn insert(&self, case: &Case) -> Result<(), StoreError> {
        let mut cases = self.cases.lock().await;
        if cases.iter().any(|c| c.case_id == case.case_id) {
            return Err(StoreError::UniqueViolation {
                constraint: "cases_pkey".to_string(),
            });
        }
        cases.push(case.clone());
        Ok(())
    }

    async fn get(&self, case_id: CaseId) -> Result<Option<Case>, StoreError> {
        let cases = self.cases.lock().await;
        Ok(cases.iter().find(|c| c.case_id == case_id).cloned())
    }

    async fn delete(&self, case_id: CaseId) -> Result<(), StoreError> {
        self.cases.lock().await.retain(|c| c.case_id != case_id);
        Ok(())
    }
}

impl InMemoryCaseStore {
    pub async fn len(&self) -> usize {
        self.cases.lock().await.len()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: Mutex<Vec<Artifact>>,
}

impl InMemoryArtifactStore {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait::async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn insert(&self, artifact: &Artifact) -> Result<(), StoreError> {
        self.artifacts.lock().await.push(artifact.clone());
        Ok(())
    }

    async fn list(&self, case_id: CaseId, kind: ArtifactKind) -> Result<Vec<Artifact>, StoreError> {
        let artifacts = self.artifacts.lock().await;
        let mut result: Vec<_> = artifacts
            .iter()
            .filter(|a| a.case_id == case_id && a.kind == kind)
            .cloned()
            .collect();
        result.sort_by_key(|a| (a.created_at, a.artifact_id));
        Ok(result)
    }

    async fn delete_for_case(&self, case_id: CaseId) -> Result<(), StoreError> {
        self.artifacts.lock().await.retain(|a| a.case_id != case_id);
        Ok(())
    }
}

impl InMemoryArtifactStore {
    pub async fn len(&self) -> usize {
        self.artifacts.lock().await.len()
    }
}
