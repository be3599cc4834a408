//! Inference boundary and deterministic analysis for case processing.
//!
//! - [`provider::InferenceProvider`] is the black-box capability; [`mock`] and
//!   [`remote`] are the two shipped implementations.
//! - [`gateway::InferenceGateway`] bounds every call with the configured timeout.
//! - [`qc`] and [`retrieval`] are pure functions with no I/O.

pub mod gateway;
pub mod mock;
pub mod provider;
pub mod qc;
pub mod remote;
pub mod result;
pub mod retrieval;

pub use gateway::{GatewayPing, InferenceGateway};
pub use mock::{MOCK_MODEL_SOURCE, MockInferenceProvider};
pub use provider::{HealthCheck, InferenceProvider, InferenceSettings, ProviderHealth, ProviderKind};
pub use qc::{BLOCKED_DOWNGRADED, QcIssues, QcReport, QcStatus, evaluate_findings};
pub use remote::RemoteInferenceProvider;
pub use result::{ImageInput, InferenceError, InferenceRequest, InferenceResult};
pub use retrieval::{DEFAULT_TOP_K, ScoredDocument, assemble_context, score_documents};
