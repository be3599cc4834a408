use std::sync::Arc;

use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use caseflow_infra::Services;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/pull", post(pull_next))
        .route("/stats", get(queue_stats))
}

/// Claim the oldest queued job; `{"job": null}` when the queue is empty.
pub async fn pull_next(Extension(services): Extension<Arc<Services>>) -> axum::response::Response {
    match services.claimer.claim_next().await {
        Ok(job) => Json(dto::QueuePullResponse { job }).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn queue_stats(Extension(services): Extension<Arc<Services>>) -> axum::response::Response {
    match services.claimer.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
