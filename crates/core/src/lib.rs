//! `caseflow-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed ids, cases, artifacts, knowledge documents, and the job lifecycle table.

pub mod artifact;
pub mod case;
pub mod error;
pub mod id;
pub mod job;
pub mod knowledge;

pub use artifact::{Artifact, ArtifactKind, BlobLocator};
pub use case::{Case, CaseStatus};
pub use error::{DomainError, TransitionError};
pub use id::{ArtifactId, CaseId, DocumentId, JobId};
pub use job::{DEFAULT_FAILURE_CODE, Job, JobStage, JobState};
pub use knowledge::{KnowledgeDocument, NewDocument};
