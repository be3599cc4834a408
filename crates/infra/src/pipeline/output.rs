//! Persisted shape of one pipeline run. Result consumers read it verbatim.

use serde::{Deserialize, Serialize};

use caseflow_ai::{InferenceResult, QcIssues, QcStatus, ScoredDocument};
use caseflow_core::{CaseId, DocumentId, JobId};

pub const OUTPUT_FILE_NAME: &str = "agent_output.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub case_id: CaseId,
    pub job_id: JobId,
    pub inference: InferenceResult,
    pub qc_status: QcStatus,
    /// `category:issue` strings.
    pub qc_issues: Vec<String>,
    pub qc_issue_groups: QcIssues,
    pub rag: RetrievalTrace,
    pub observability: RunObservability,
}

/// What retrieval saw and produced. Empty when the case had no text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalTrace {
    pub query: Option<String>,
    pub hits: Vec<RetrievalHit>,
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub doc_id: DocumentId,
    pub title: String,
    pub source: String,
    pub source_version: String,
    pub score: f64,
}

impl From<&ScoredDocument> for RetrievalHit {
    fn from(hit: &ScoredDocument) -> Self {
        Self {
            doc_id: hit.document.doc_id,
            title: hit.document.title.clone(),
            source: hit.document.source.clone(),
            source_version: hit.document.source_version.clone(),
            score: hit.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunObservability {
    pub durations_ms: StageDurations,
    pub inference_runtime: InferenceRuntime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDurations {
    pub retrieval: u64,
    pub inference: u64,
    pub qc: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceRuntime {
    pub run_mode: String,
    pub model_source: String,
    pub generated_token_count: u64,
    pub used_fallback: bool,
}

impl From<&InferenceResult> for InferenceRuntime {
    fn from(result: &InferenceResult) -> Self {
        Self {
            run_mode: result.run_mode.clone(),
            model_source: result.model_source.clone(),
            generated_token_count: result.generated_token_count,
            used_fallback: result.used_fallback,
        }
    }
}
