use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use caseflow_core::{BlobLocator, CaseId};

/// One image handed to the inference capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInput {
    pub file_name: String,
    pub locator: BlobLocator,
}

/// Input to one inference call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub case_id: CaseId,
    pub notes: Option<String>,
    pub images: Vec<ImageInput>,
    /// Assembled retrieval context, if any.
    pub context: Option<String>,
}

impl InferenceRequest {
    pub fn new(case_id: CaseId) -> Self {
        Self {
            case_id,
            notes: None,
            images: Vec::new(),
            context: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_images(mut self, images: Vec<ImageInput>) -> Self {
        self.images = images;
        self
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    /// Non-blank notes, if any.
    pub fn notes_text(&self) -> Option<&str> {
        self.notes
            .as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
    }

    /// True when there is at least one usable modality (text or image).
    pub fn has_modalities(&self) -> bool {
        self.notes_text().is_some() || !self.images.is_empty()
    }
}

/// Normalized result of an inference call.
///
/// Downstream result consumers read this shape verbatim from persisted outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub case_id: String,
    pub summary: String,
    pub findings: Vec<String>,
    pub confidence: f64,
    pub run_mode: String,
    pub model_source: String,
    pub generated_token_count: u64,
    pub used_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text_with_markup: Option<String>,
}

impl InferenceResult {
    /// All findings joined into one block for quality control.
    pub fn findings_text(&self) -> String {
        self.findings.join(" ")
    }
}

/// Failure reaching or interpreting the inference capability.
///
/// Every variant maps to a short machine-readable [`code`](InferenceError::code)
/// that is recorded verbatim as the job's error code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InferenceError {
    #[error("neither notes nor images were provided")]
    MissingModalities,

    #[error("inference provider unreachable: {0}")]
    Unreachable(String),

    #[error("inference call exceeded {0:?}")]
    Timeout(Duration),

    #[error("inference provider answered {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("inference provider returned invalid json: {0}")]
    InvalidJson(String),

    #[error("inference provider returned malformed findings")]
    InvalidFindings,

    #[error("inference client setup failed: {0}")]
    Client(String),
}

impl InferenceError {
    pub fn code(&self) -> &'static str {
        match self {
            InferenceError::MissingModalities => "missing_input_modalities",
            InferenceError::Unreachable(_) => "inference_unreachable",
            InferenceError::Timeout(_) => "inference_timeout",
            InferenceError::HttpStatus { .. } => "inference_http_status",
            InferenceError::InvalidJson(_) => "inference_invalid_json",
            InferenceError::InvalidFindings => "inference_invalid_findings",
            InferenceError::Client(_) => "inference_client_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_notes_do_not_count_as_a_modality() {
        let req = InferenceRequest::new(CaseId::new()).with_notes("   ");
        assert!(!req.has_modalities());

        let req = req.with_images(vec![ImageInput {
            file_name: "scan.png".into(),
            locator: BlobLocator::new("mem://scan.png"),
        }]);
        assert!(req.has_modalities());
    }

    #[test]
    fn optional_raw_text_is_omitted_when_absent() {
        let result = InferenceResult {
            case_id: "c1".into(),
            summary: "s".into(),
            findings: vec!["a".into(), "b".into()],
            confidence: 0.5,
            run_mode: "mock".into(),
            model_source: "mock://deterministic".into(),
            generated_token_count: 3,
            used_fallback: false,
            raw_text: None,
            raw_text_with_markup: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("raw_text").is_none());
        assert_eq!(result.findings_text(), "a b");
    }
}
