use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use caseflow_infra::Services;

use crate::app::errors;

pub async fn health_live() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Ready once the job store answers.
pub async fn health_ready(Extension(services): Extension<Arc<Services>>) -> axum::response::Response {
    match services.claimer.stats().await {
        Ok(stats) => Json(json!({
            "status": "ready",
            "in_memory": services.in_memory,
            "jobs": stats,
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            errors::json_error(StatusCode::SERVICE_UNAVAILABLE, "not_ready", e.to_string())
        }
    }
}
