use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use caseflow_core::{JobId, JobStage};
use caseflow_infra::Services;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_job))
        .route("/:id", get(get_job))
        .route("/:id/advance", post(advance_job))
}

/// 201 for a new job, 200 when the key replays an existing one.
pub async fn create_job(
    Extension(services): Extension<Arc<Services>>,
    Json(body): Json<dto::CreateJobRequest>,
) -> axum::response::Response {
    if let Err(resp) = dto::validate_idempotency_key(&body.idempotency_key) {
        return resp;
    }
    let stage = match JobStage::new(body.stage) {
        Ok(s) => s,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if let Err(e) = services.cases.get_case(body.case_id).await {
        return errors::case_error_to_response(e);
    }

    match services
        .machine
        .create_with_idempotency(body.case_id, stage, body.idempotency_key.trim())
        .await
    {
        Ok(admission) => {
            let status = if admission.created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            (status, Json(admission.job)).into_response()
        }
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn get_job(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let job_id: JobId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.machine.get(job_id).await {
        Ok(job) => Json(job).into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn advance_job(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdvanceJobRequest>,
) -> axum::response::Response {
    let job_id: JobId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .machine
        .advance(job_id, body.target_state, body.error_code)
        .await
    {
        Ok(job) => Json(job).into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}
