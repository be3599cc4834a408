use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use caseflow_infra::Services;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/ingest", post(ingest))
        .route("/search", post(search))
}

pub async fn ingest(
    Extension(services): Extension<Arc<Services>>,
    Json(body): Json<dto::IngestDocumentRequest>,
) -> axum::response::Response {
    match services.knowledge.ingest(body.into()).await {
        Ok(document) => (StatusCode::CREATED, Json(document)).into_response(),
        Err(e) => errors::knowledge_error_to_response(e),
    }
}

pub async fn search(
    Extension(services): Extension<Arc<Services>>,
    Json(body): Json<dto::SearchRequest>,
) -> axum::response::Response {
    if let Err(resp) = dto::validate_top_k(body.top_k) {
        return resp;
    }

    match services.knowledge.search(&body.query, body.top_k).await {
        Ok(hits) => Json(dto::SearchResponse {
            items: hits.into_iter().map(dto::SearchItem::from).collect(),
        })
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
