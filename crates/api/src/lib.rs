//! HTTP API: routing, API-key guard, and request/response mapping over the
//! case workflow services.

pub mod app;
pub mod middleware;
