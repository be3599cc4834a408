//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use caseflow_infra::Services;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
pub fn build_app(services: Services, api_key: impl Into<String>) -> Router {
    let key_state = middleware::ApiKeyState::new(api_key);
    let services = Arc::new(services);

    // Protected routes: require a matching x-api-key header.
    let protected = routes::router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            key_state,
            middleware::api_key_middleware,
        ));

    Router::new()
        .route("/health/live", get(routes::system::health_live))
        .route("/health/ready", get(routes::system::health_ready))
        .layer(Extension(services))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
