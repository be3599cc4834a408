use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use caseflow_ai::InferenceError;
use caseflow_core::DomainError;
use caseflow_infra::cases::CaseError;
use caseflow_infra::jobs::JobError;
use caseflow_infra::knowledge::KnowledgeError;
use caseflow_infra::{AdmissionError, PipelineError, StoreError};

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        StoreError::UniqueViolation { constraint } => {
            json_error(StatusCode::CONFLICT, "unique_violation", constraint)
        }
        StoreError::Contention(msg) => json_error(StatusCode::CONFLICT, "write_contention", msg),
        StoreError::Storage(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg),
    }
}

pub fn job_error_to_response(err: JobError) -> axum::response::Response {
    match err {
        JobError::NotFound(id) => json_error(StatusCode::NOT_FOUND, "job_not_found", id.to_string()),
        JobError::InvalidTransition(e) => {
            json_error(StatusCode::CONFLICT, "invalid_transition", e.to_string())
        }
        JobError::IdempotencyConflict { constraint } => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "idempotency_key_conflict_across_case",
            constraint,
        ),
        JobError::Store(e) => store_error_to_response(e),
    }
}

pub fn case_error_to_response(err: CaseError) -> axum::response::Response {
    match err {
        CaseError::Invalid(e) => domain_error_to_response(e),
        CaseError::NotFound(id) => json_error(StatusCode::NOT_FOUND, "case_not_found", id.to_string()),
        CaseError::Store(e) => store_error_to_response(e),
    }
}

pub fn knowledge_error_to_response(err: KnowledgeError) -> axum::response::Response {
    match err {
        KnowledgeError::Invalid(e) => domain_error_to_response(e),
        KnowledgeError::Store(e) => store_error_to_response(e),
    }
}

pub fn admission_error_to_response(err: AdmissionError) -> axum::response::Response {
    match err {
        AdmissionError::MissingInput => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "missing_input_modalities",
            "provide notes or at least one image",
        ),
        AdmissionError::Invalid(e) => domain_error_to_response(e),
        AdmissionError::Blob(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "blob_error", e.to_string()),
        AdmissionError::Store(e) => store_error_to_response(e),
        AdmissionError::Job(e) => job_error_to_response(e),
    }
}

pub fn pipeline_error_to_response(err: PipelineError) -> axum::response::Response {
    match err {
        PipelineError::Store(e) => store_error_to_response(e),
        PipelineError::Job(e) => job_error_to_response(e),
        other => json_error(StatusCode::INTERNAL_SERVER_ERROR, other.code(), other.to_string()),
    }
}

/// Provider failures surface as 502; a request without modalities is the caller's fault.
pub fn inference_error_to_response(err: InferenceError) -> axum::response::Response {
    match err {
        InferenceError::MissingModalities => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, err.code(), err.to_string())
        }
        other => json_error(StatusCode::BAD_GATEWAY, other.code(), other.to_string()),
    }
}

/// Parse a path id, answering 400 on garbage.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: core::str::FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(domain_error_to_response)
}

#[cfg(test)]
mod tests {
    use caseflow_core::{JobId, JobState, TransitionError};

    use super::*;

    #[test]
    fn job_errors_map_to_documented_statuses() {
        let not_found = job_error_to_response(JobError::NotFound(JobId::new()));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let invalid = job_error_to_response(JobError::InvalidTransition(TransitionError {
            from: JobState::Succeeded,
            to: JobState::Running,
        }));
        assert_eq!(invalid.status(), StatusCode::CONFLICT);

        let conflict = job_error_to_response(JobError::IdempotencyConflict {
            constraint: "jobs_idempotency_key_key".into(),
        });
        assert_eq!(conflict.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn provider_failures_are_bad_gateway() {
        let resp = inference_error_to_response(InferenceError::Unreachable("refused".into()));
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let resp = inference_error_to_response(InferenceError::MissingModalities);
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn domain_errors_are_client_errors() {
        let resp = domain_error_to_response(DomainError::validation("subject_ref is blank"));
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let resp = domain_error_to_response(DomainError::invalid_id("nope"));
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn malformed_ids_are_bad_requests() {
        let err = parse_id::<JobId>("nope").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
