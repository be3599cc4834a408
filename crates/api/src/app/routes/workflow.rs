use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use caseflow_core::JobId;
use caseflow_infra::{ImageUpload, Services, Submission};

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/submit", post(submit))
        .route("/jobs/:id/result", get(job_result))
}

/// Read every referenced image up front so nothing is admitted on a bad path.
async fn read_images(paths: &[String]) -> Result<Vec<ImageUpload>, axum::response::Response> {
    let mut images = Vec::with_capacity(paths.len());
    for raw in paths {
        let path = FsPath::new(raw);
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| raw.clone());

        match tokio::fs::read(path).await {
            Ok(bytes) => images.push(ImageUpload { file_name, bytes }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "source_file_not_found",
                    format!("source_file_not_found:{raw}"),
                ));
            }
            Err(e) => {
                return Err(errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "source_file_unreadable",
                    format!("{raw}: {e}"),
                ));
            }
        }
    }
    Ok(images)
}

pub async fn submit(
    Extension(services): Extension<Arc<Services>>,
    Json(body): Json<dto::WorkflowSubmitRequest>,
) -> axum::response::Response {
    if let Some(key) = body.idempotency_key.as_deref() {
        if let Err(resp) = dto::validate_idempotency_key(key) {
            return resp;
        }
    }

    let images = match read_images(&body.images).await {
        Ok(images) => images,
        Err(resp) => return resp,
    };

    let submission = Submission {
        subject_ref: body.subject_ref,
        notes: body.notes,
        images,
        idempotency_key: body.idempotency_key.map(|k| k.trim().to_string()),
    };

    match services.admission.submit(submission).await {
        Ok(receipt) => (
            StatusCode::CREATED,
            Json(dto::WorkflowSubmitResponse {
                case: receipt.case,
                job: receipt.job,
                created: receipt.created,
                artifacts: receipt.artifacts,
            }),
        )
            .into_response(),
        Err(e) => errors::admission_error_to_response(e),
    }
}

/// The job plus its resolved output (`null` until one is persisted).
pub async fn job_result(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let job_id: JobId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let job = match services.machine.get(job_id).await {
        Ok(job) => job,
        Err(e) => return errors::job_error_to_response(e),
    };

    match services.resolver.resolve(job_id).await {
        Ok(output) => Json(dto::WorkflowResultResponse { job, output }).into_response(),
        Err(e) => errors::pipeline_error_to_response(e),
    }
}
