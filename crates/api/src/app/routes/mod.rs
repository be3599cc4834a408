use axum::Router;

pub mod cases;
pub mod inference;
pub mod jobs;
pub mod knowledge;
pub mod qc;
pub mod queue;
pub mod system;
pub mod workflow;

/// Router for all API-key protected endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/cases", cases::router())
        .nest("/jobs", jobs::router())
        .nest("/queue", queue::router())
        .nest("/workflow", workflow::router())
        .nest("/knowledge", knowledge::router())
        .nest("/qc", qc::router())
        .nest("/inference", inference::router())
}
