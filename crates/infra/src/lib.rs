//! Infrastructure layer: stores, blob storage, job orchestration, and the worker
//! pipeline.
//!
//! Every store has an in-memory implementation (tests/dev) and a Postgres one.

pub mod admission;
pub mod blob;
pub mod bootstrap;
pub mod cases;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod knowledge;
pub mod pipeline;
pub mod workers;

mod integration_tests;

pub use admission::{AdmissionError, ImageUpload, Submission, SubmissionReceipt, WorkflowAdmission};
pub use bootstrap::{Backends, BootstrapError, Services};
pub use config::{ConfigError, Settings};
pub use error::StoreError;
pub use pipeline::{PipelineError, PipelineSettings, RunSummary, WorkerPipeline};
