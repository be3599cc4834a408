use axum::{routing::post, Json, Router};

use caseflow_ai::evaluate_findings;

use crate::app::dto;

pub fn router() -> Router {
    Router::new().route("/evaluate", post(evaluate))
}

pub async fn evaluate(Json(body): Json<dto::QcEvaluateRequest>) -> Json<dto::QcEvaluateResponse> {
    Json(evaluate_findings(&body.findings).into())
}
