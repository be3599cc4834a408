use serde::{Deserialize, Serialize};

use caseflow_ai::{DEFAULT_TOP_K, QcIssues, QcReport, QcStatus, ScoredDocument};
use caseflow_core::{Artifact, Case, CaseId, DocumentId, Job, JobState, NewDocument};
use caseflow_infra::knowledge::{SNIPPET_CHARS, snippet};

use crate::app::errors;

/// Idempotency keys shorter than this are rejected at the transport edge.
pub const MIN_IDEMPOTENCY_KEY_LEN: usize = 8;
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;
pub const MAX_SEARCH_TOP_K: usize = 10;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateCaseRequest {
    #[serde(alias = "patient_pseudo_id")]
    pub subject_ref: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub case_id: CaseId,
    pub stage: String,
    pub idempotency_key: String,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceJobRequest {
    pub target_state: JobState,
    #[serde(default)]
    pub error_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowSubmitRequest {
    #[serde(alias = "patient_pseudo_id")]
    pub subject_ref: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Server-local file paths read at submission time.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IngestDocumentRequest {
    pub source: String,
    #[serde(default)]
    pub source_version: Option<String>,
    pub title: String,
    #[serde(alias = "content")]
    pub body: String,
}

impl From<IngestDocumentRequest> for NewDocument {
    fn from(req: IngestDocumentRequest) -> Self {
        NewDocument {
            source: req.source,
            source_version: req.source_version,
            title: req.title,
            body: req.body,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize)]
pub struct QcEvaluateRequest {
    pub findings: String,
}

#[derive(Debug, Deserialize)]
pub struct RunInferenceRequest {
    pub case_id: CaseId,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct QueuePullResponse {
    pub job: Option<Job>,
}

#[derive(Debug, Serialize)]
pub struct WorkflowSubmitResponse {
    pub case: Case,
    pub job: Job,
    pub created: bool,
    pub artifacts: Vec<Artifact>,
}

#[derive(Debug, Serialize)]
pub struct WorkflowResultResponse {
    pub job: Job,
    pub output: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct SearchItem {
    pub doc_id: DocumentId,
    pub source: String,
    pub source_version: String,
    pub title: String,
    pub snippet: String,
    pub score: f64,
}

impl From<ScoredDocument> for SearchItem {
    fn from(hit: ScoredDocument) -> Self {
        let doc = hit.document;
        Self {
            snippet: snippet(&doc.body, SNIPPET_CHARS),
            doc_id: doc.doc_id,
            source: doc.source,
            source_version: doc.source_version,
            title: doc.title,
            score: hit.score,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Serialize)]
pub struct QcEvaluateResponse {
    pub status: QcStatus,
    pub issues: Vec<String>,
    pub issue_groups: QcIssues,
}

impl From<QcReport> for QcEvaluateResponse {
    fn from(report: QcReport) -> Self {
        Self {
            status: report.status,
            issues: report.issues.flatten(),
            issue_groups: report.issues,
        }
    }
}

// -------------------------
// Validation helpers
// -------------------------

pub fn validate_idempotency_key(key: &str) -> Result<(), axum::response::Response> {
    let len = key.trim().chars().count();
    if !(MIN_IDEMPOTENCY_KEY_LEN..=MAX_IDEMPOTENCY_KEY_LEN).contains(&len) {
        return Err(errors::json_error(
            axum::http::StatusCode::UNPROCESSABLE_ENTITY,
            "validation_error",
            format!(
                "idempotency_key must be {MIN_IDEMPOTENCY_KEY_LEN}..={MAX_IDEMPOTENCY_KEY_LEN} characters"
            ),
        ));
    }
    Ok(())
}

pub fn validate_top_k(top_k: usize) -> Result<(), axum::response::Response> {
    if !(1..=MAX_SEARCH_TOP_K).contains(&top_k) {
        return Err(errors::json_error(
            axum::http::StatusCode::UNPROCESSABLE_ENTITY,
            "validation_error",
            format!("top_k must be 1..={MAX_SEARCH_TOP_K}"),
        ));
    }
    Ok(())
}
