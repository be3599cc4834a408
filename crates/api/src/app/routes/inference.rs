use std::sync::Arc;

use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use caseflow_ai::{GatewayPing, InferenceRequest};
use caseflow_infra::Services;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/run", post(run))
        .route("/ping", get(ping))
}

/// One-off text inference through the configured gateway; no job is recorded.
pub async fn run(
    Extension(services): Extension<Arc<Services>>,
    Json(body): Json<dto::RunInferenceRequest>,
) -> axum::response::Response {
    let mut request = InferenceRequest::new(body.case_id).with_context(body.context);
    if let Some(notes) = body.notes {
        request = request.with_notes(notes);
    }

    match services.gateway.invoke(&request).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => errors::inference_error_to_response(e),
    }
}

pub async fn ping(Extension(services): Extension<Arc<Services>>) -> Json<GatewayPing> {
    Json(services.gateway.ping().await)
}
