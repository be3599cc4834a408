//! Worker pipeline: one claimed job from inputs to a terminal state.
//!
//! claim → load inputs → retrieval → inference → QC → persist output → advance.
//! Stage failures become job transitions; only infrastructure failures that
//! prevent recording a transition surface as [`PipelineError`].

pub mod output;
pub mod resolver;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use caseflow_ai::{
    ImageInput, InferenceGateway, InferenceRequest, QcStatus, assemble_context, evaluate_findings,
    DEFAULT_TOP_K,
};
use caseflow_core::{Artifact, ArtifactKind, BlobLocator, CaseId, Job, JobId, JobState};

use crate::blob::{BlobError, BlobStore};
use crate::cases::ArtifactStore;
use crate::error::StoreError;
use crate::jobs::{JobError, JobStateMachine, QueueClaimer};
use crate::knowledge::KnowledgeIndex;

pub use output::{
    AgentOutput, InferenceRuntime, OUTPUT_FILE_NAME, RetrievalHit, RetrievalTrace, RunObservability,
    StageDurations,
};
pub use resolver::OutputResolver;

pub const MISSING_INPUT_CODE: &str = "missing_input_modalities";
pub const QC_BLOCKED_CODE: &str = "qc_blocked";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("failed to encode output: {0}")]
    Encode(String),
}

impl PipelineError {
    /// Error code recorded on the job when this error aborts a run.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Store(_) => "pipeline_store_error",
            PipelineError::Blob(_) => "pipeline_blob_error",
            PipelineError::Job(_) => "pipeline_state_error",
            PipelineError::Encode(_) => "pipeline_encode_error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub retrieval_top_k: usize,
    /// Debug/soft-launch: treat `blocked` as `review_required`.
    pub downgrade_blocked: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            retrieval_top_k: DEFAULT_TOP_K,
            downgrade_blocked: false,
        }
    }
}

/// Outcome of one processed job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub job_id: JobId,
    pub case_id: CaseId,
    pub state: JobState,
    pub error_code: Option<String>,
    pub qc_status: Option<QcStatus>,
    pub output: Option<BlobLocator>,
}

/// Sources the pipeline reads from and writes to.
#[derive(Clone)]
pub struct PipelineDeps {
    pub claimer: QueueClaimer,
    pub machine: JobStateMachine,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub knowledge: KnowledgeIndex,
    pub gateway: InferenceGateway,
}

struct CaseInputs {
    notes: Option<String>,
    images: Vec<ImageInput>,
}

#[derive(Clone)]
pub struct WorkerPipeline {
    deps: PipelineDeps,
    settings: PipelineSettings,
}

impl WorkerPipeline {
    pub fn new(deps: PipelineDeps, settings: PipelineSettings) -> Self {
        Self { deps, settings }
    }

    pub fn settings(&self) -> PipelineSettings {
        self.settings
    }

    /// Claim and fully process at most one job. `Ok(None)` when the queue is empty.
    pub async fn process_next(&self) -> Result<Option<RunSummary>, PipelineError> {
        let Some(job) = self.deps.claimer.claim_next().await? else {
            return Ok(None);
        };
        info!(job_id = %job.job_id, case_id = %job.case_id, retry_count = job.retry_count, "pipeline run started");

        match self.execute(&job).await {
            Ok(summary) => Ok(Some(summary)),
            Err(err) => {
                error!(job_id = %job.job_id, error = %err, code = err.code(), "pipeline run aborted");
                self.finish(&job, JobState::Failed, Some(err.code()), None, None)
                    .await
                    .map(Some)
            }
        }
    }

    async fn execute(&self, job: &Job) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        let inputs = self.load_inputs(job.case_id).await?;

        if inputs.notes.is_none() && inputs.images.is_empty() {
            warn!(job_id = %job.job_id, case_id = %job.case_id, "no usable inputs");
            return self
                .finish(job, JobState::Failed, Some(MISSING_INPUT_CODE), None, None)
                .await;
        }

        let stage = Instant::now();
        let rag = match &inputs.notes {
            Some(text) => {
                let hits = self
                    .deps
                    .knowledge
                    .search(text, self.settings.retrieval_top_k)
                    .await?;
                RetrievalTrace {
                    query: Some(text.clone()),
                    context: assemble_context(&hits),
                    hits: hits.iter().map(RetrievalHit::from).collect(),
                }
            }
            None => RetrievalTrace::default(),
        };
        let retrieval_ms = elapsed_ms(stage);
        debug!(job_id = %job.job_id, hits = rag.hits.len(), retrieval_ms, "retrieval done");

        let mut request = InferenceRequest::new(job.case_id)
            .with_images(inputs.images)
            .with_context(rag.context.clone());
        request.notes = inputs.notes;

        let stage = Instant::now();
        let result = match self.deps.gateway.invoke(&request).await {
            Ok(result) => result,
            Err(err) => {
                return self
                    .finish(job, JobState::Failed, Some(err.code()), None, None)
                    .await;
            }
        };
        let inference_ms = elapsed_ms(stage);

        let stage = Instant::now();
        let mut report = evaluate_findings(&result.findings_text());
        let qc_ms = elapsed_ms(stage);

        let (target, error_code) = match report.status {
            QcStatus::Blocked if self.settings.downgrade_blocked => {
                report = report.downgrade_blocked();
                (JobState::Succeeded, None)
            }
            QcStatus::Blocked => (JobState::Failed, Some(QC_BLOCKED_CODE)),
            QcStatus::Pass | QcStatus::ReviewRequired => (JobState::Succeeded, None),
        };

        let output = AgentOutput {
            case_id: job.case_id,
            job_id: job.job_id,
            qc_status: report.status,
            qc_issues: report.issues.flatten(),
            qc_issue_groups: report.issues,
            rag,
            observability: RunObservability {
                durations_ms: StageDurations {
                    retrieval: retrieval_ms,
                    inference: inference_ms,
                    qc: qc_ms,
                    total: elapsed_ms(started),
                },
                inference_runtime: InferenceRuntime::from(&result),
            },
            inference: result,
        };
        let locator = self.persist_output(&output).await?;

        self.finish(job, target, error_code, Some(output.qc_status), Some(locator))
            .await
    }

    async fn load_inputs(&self, case_id: CaseId) -> Result<CaseInputs, PipelineError> {
        let notes_artifacts = self.deps.artifacts.list(case_id, ArtifactKind::InputNotes).await?;
        let notes = match notes_artifacts.last() {
            Some(latest) => self
                .deps
                .blobs
                .get_text(&latest.locator)
                .await?
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            None => None,
        };

        let mut images = Vec::new();
        for artifact in self.deps.artifacts.list(case_id, ArtifactKind::InputImage).await? {
            if self.deps.blobs.exists(&artifact.locator).await? {
                images.push(ImageInput {
                    file_name: artifact.file_name,
                    locator: artifact.locator,
                });
            }
        }

        Ok(CaseInputs { notes, images })
    }

    async fn persist_output(&self, output: &AgentOutput) -> Result<BlobLocator, PipelineError> {
        let payload =
            serde_json::to_value(output).map_err(|e| PipelineError::Encode(e.to_string()))?;
        let locator = self
            .deps
            .blobs
            .put_json(output.case_id, OUTPUT_FILE_NAME, &payload)
            .await?;
        let artifact = Artifact::new(
            output.case_id,
            ArtifactKind::AgentOutput,
            OUTPUT_FILE_NAME,
            locator.clone(),
            Utc::now(),
        );
        self.deps.artifacts.insert(&artifact).await?;
        Ok(locator)
    }

    async fn finish(
        &self,
        job: &Job,
        target: JobState,
        error_code: Option<&str>,
        qc_status: Option<QcStatus>,
        output: Option<BlobLocator>,
    ) -> Result<RunSummary, PipelineError> {
        let advanced = self
            .deps
            .machine
            .advance(job.job_id, target, error_code.map(str::to_string))
            .await?;

        info!(
            job_id = %advanced.job_id,
            case_id = %advanced.case_id,
            state = %advanced.state,
            error_code = advanced.error_code.as_deref().unwrap_or(""),
            qc_status = qc_status.map(|s| s.as_str()).unwrap_or(""),
            "pipeline run finished"
        );

        Ok(RunSummary {
            job_id: advanced.job_id,
            case_id: advanced.case_id,
            state: advanced.state,
            error_code: advanced.error_code,
            qc_status,
            output,
        })
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
