use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use caseflow_core::CaseId;
use caseflow_infra::Services;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_case))
        .route("/:id", get(get_case))
}

pub async fn create_case(
    Extension(services): Extension<Arc<Services>>,
    Json(body): Json<dto::CreateCaseRequest>,
) -> axum::response::Response {
    match services.cases.create_case(&body.subject_ref).await {
        Ok(case) => (StatusCode::CREATED, Json(case)).into_response(),
        Err(e) => errors::case_error_to_response(e),
    }
}

pub async fn get_case(
    Extension(services): Extension<Arc<Services>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let case_id: CaseId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.cases.get_case(case_id).await {
        Ok(case) => Json(case).into_response(),
        Err(e) => errors::case_error_to_response(e),
    }
}
