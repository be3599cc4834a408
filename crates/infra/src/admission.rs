//! Workflow admission: open a case, store its inputs, queue an inference job.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use caseflow_core::{Artifact, ArtifactKind, BlobLocator, Case, CaseId, DomainError, Job, JobStage};

use crate::blob::{BlobError, BlobStore};
use crate::cases::{ArtifactStore, CaseStore};
use crate::error::StoreError;
use crate::jobs::{JobError, JobStateMachine};

pub const NOTES_FILE_NAME: &str = "notes.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub subject_ref: String,
    pub notes: Option<String>,
    pub images: Vec<ImageUpload>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub case: Case,
    pub job: Job,
    pub created: bool,
    pub artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("missing_input_modalities")]
    MissingInput,

    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Job(#[from] JobError),
}

#[derive(Clone)]
pub struct WorkflowAdmission {
    cases: Arc<dyn CaseStore>,
    artifacts: Arc<dyn ArtifactStore>,
    blobs: Arc<dyn BlobStore>,
    machine: JobStateMachine,
}

impl WorkflowAdmission {
    pub fn new(
        cases: Arc<dyn CaseStore>,
        artifacts: Arc<dyn ArtifactStore>,
        blobs: Arc<dyn BlobStore>,
        machine: JobStateMachine,
    ) -> Self {
        Self {
            cases,
            artifacts,
            blobs,
            machine,
        }
    }

    /// Admit one submission. Nothing is written when there is no usable input;
    /// rows and blobs written before a later failure are removed again.
    pub async fn submit(&self, submission: Submission) -> Result<SubmissionReceipt, AdmissionError> {
        let notes = submission
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        if notes.is_none() && submission.images.is_empty() {
            return Err(AdmissionError::MissingInput);
        }

        let case = Case::open(&submission.subject_ref, Utc::now())?;
        let idempotency_key = submission
            .idempotency_key
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| format!("workflow-{}", Uuid::now_v7()));

        let mut written = Written::default();
        match self
            .store_inputs(&case, notes.as_deref(), &submission.images, &idempotency_key, &mut written)
            .await
        {
            Ok(receipt) => Ok(receipt),
            Err(err) => {
                warn!(
                    case_id = %case.case_id,
                    error = %err,
                    blobs = written.blobs.len(),
                    rows = written.case_row,
                    "admission failed, rolling back"
                );
                self.roll_back(case.case_id, &written).await;
                Err(err)
            }
        }
    }

    /// Blobs first, then rows; the job is created last so a failure never leaves one behind.
    async fn store_inputs(
        &self,
        case: &Case,
        notes: Option<&str>,
        images: &[ImageUpload],
        idempotency_key: &str,
        written: &mut Written,
    ) -> Result<SubmissionReceipt, AdmissionError> {
        let mut pending = Vec::with_capacity(images.len() + 1);
        if let Some(notes) = notes {
            let locator = self.blobs.put_text(case.case_id, NOTES_FILE_NAME, notes).await?;
            written.blobs.push(locator.clone());
            pending.push((ArtifactKind::InputNotes, NOTES_FILE_NAME.to_string(), locator));
        }
        for image in images {
            let locator = self
                .blobs
                .put_bytes(case.case_id, &image.file_name, &image.bytes)
                .await?;
            written.blobs.push(locator.clone());
            pending.push((ArtifactKind::InputImage, image.file_name.clone(), locator));
        }

        self.cases.insert(case).await?;
        written.case_row = true;

        let mut artifacts = Vec::with_capacity(pending.len());
        for (kind, file_name, locator) in pending {
            let artifact = Artifact::new(case.case_id, kind, file_name, locator, Utc::now());
            self.artifacts.insert(&artifact).await?;
            artifacts.push(artifact);
        }

        let admission = self
            .machine
            .create_with_idempotency(case.case_id, JobStage::inference(), idempotency_key)
            .await?;

        info!(
            case_id = %case.case_id,
            job_id = %admission.job.job_id,
            artifacts = artifacts.len(),
            created = admission.created,
            "workflow submitted"
        );

        Ok(SubmissionReceipt {
            case: case.clone(),
            job: admission.job,
            created: admission.created,
            artifacts,
        })
    }

    /// Best effort: artifact rows, then the case row, then blobs.
    async fn roll_back(&self, case_id: CaseId, written: &Written) {
        if written.case_row {
            if let Err(e) = self.artifacts.delete_for_case(case_id).await {
                warn!(case_id = %case_id, error = %e, "artifact rollback failed");
            }
            if let Err(e) = self.cases.delete(case_id).await {
                warn!(case_id = %case_id, error = %e, "case rollback failed");
            }
        }
        for locator in &written.blobs {
            if let Err(e) = self.blobs.delete(locator).await {
                warn!(locator = %locator, error = %e, "blob cleanup failed");
            }
        }
    }
}

/// What a submission has persisted so far.
#[derive(Debug, Default)]
struct Written {
    blobs: Vec<BlobLocator>,
    case_row: bool,
}
