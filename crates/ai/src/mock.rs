use crate::provider::InferenceProvider;
use crate::result::{InferenceError, InferenceRequest, InferenceResult};

pub const MOCK_MODEL_SOURCE: &str = "mock://deterministic";

const SUMMARY_MAX_CHARS: usize = 80;

/// Deterministic in-process provider for development and tests.
///
/// Same request, same result. Never fails except on missing modalities.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockInferenceProvider;

impl MockInferenceProvider {
    pub fn new() -> Self {
        Self
    }

    fn summarize(request: &InferenceRequest) -> String {
        match request.notes_text() {
            Some(notes) => {
                let short = if notes.chars().count() <= SUMMARY_MAX_CHARS {
                    notes.to_string()
                } else {
                    let head: String = notes.chars().take(SUMMARY_MAX_CHARS - 3).collect();
                    format!("{head}...")
                };
                format!("Mock推理结论：{short}")
            }
            None => format!("Mock推理结论：共{}张影像", request.images.len()),
        }
    }
}

#[async_trait::async_trait]
impl InferenceProvider for MockInferenceProvider {
    async fn infer(&self, request: &InferenceRequest) -> Result<InferenceResult, InferenceError> {
        if !request.has_modalities() {
            return Err(InferenceError::MissingModalities);
        }

        let summary = Self::summarize(request);
        let findings = vec![
            "病灶较前变化稳定，建议继续随访。".to_string(),
            "未见明显新发高危征象。".to_string(),
        ];
        let generated = summary.chars().count()
            + findings.iter().map(|f| f.chars().count()).sum::<usize>();

        Ok(InferenceResult {
            case_id: request.case_id.to_string(),
            summary,
            findings,
            confidence: 0.72,
            run_mode: "mock".to_string(),
            model_source: MOCK_MODEL_SOURCE.to_string(),
            generated_token_count: generated as u64,
            used_fallback: false,
            raw_text: None,
            raw_text_with_markup: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use caseflow_core::{BlobLocator, CaseId};

    use super::*;
    use crate::result::ImageInput;

    #[tokio::test]
    async fn echoes_case_and_truncates_long_notes() {
        let case_id = CaseId::new();
        let notes = "右肺病灶".repeat(40);
        let req = InferenceRequest::new(case_id).with_notes(notes);

        let result = MockInferenceProvider::new().infer(&req).await.unwrap();
        assert_eq!(result.case_id, case_id.to_string());
        assert!(result.summary.ends_with("..."));
        assert_eq!(result.findings.len(), 2);
        assert_eq!(result.run_mode, "mock");
    }

    #[tokio::test]
    async fn image_only_requests_are_served() {
        let req = InferenceRequest::new(CaseId::new()).with_images(vec![ImageInput {
            file_name: "a.png".into(),
            locator: BlobLocator::new("mem://a"),
        }]);
        let result = MockInferenceProvider::new().infer(&req).await.unwrap();
        assert!(result.summary.contains("1张影像"));
    }

    #[tokio::test]
    async fn empty_requests_fail_with_missing_modalities() {
        let req = InferenceRequest::new(CaseId::new());
        let err = MockInferenceProvider::new().infer(&req).await.unwrap_err();
        assert_eq!(err.code(), "missing_input_modalities");
    }
}
