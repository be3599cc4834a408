//! Artifacts: immutable, kind-tagged blob references attached to a case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::{ArtifactId, CaseId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Free-text notes submitted with the case.
    InputNotes,
    /// One uploaded image.
    InputImage,
    /// A pipeline output payload (JSON).
    AgentOutput,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::InputNotes => "input_notes",
            ArtifactKind::InputImage => "input_image",
            ArtifactKind::AgentOutput => "agent_output",
        }
    }
}

impl core::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ArtifactKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input_notes" => Ok(ArtifactKind::InputNotes),
            "input_image" => Ok(ArtifactKind::InputImage),
            "agent_output" => Ok(ArtifactKind::AgentOutput),
            other => Err(DomainError::validation(format!("unknown artifact kind: {other}"))),
        }
    }
}

/// Stable locator returned by blob storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobLocator(String);

impl BlobLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for BlobLocator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Written once, never mutated. Newer artifacts of the same kind supersede
/// older ones only at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub artifact_id: ArtifactId,
    pub case_id: CaseId,
    pub kind: ArtifactKind,
    pub file_name: String,
    pub locator: BlobLocator,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(
        case_id: CaseId,
        kind: ArtifactKind,
        file_name: impl Into<String>,
        locator: BlobLocator,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            artifact_id: ArtifactId::new(),
            case_id,
            kind,
            file_name: file_name.into(),
            locator,
            created_at: now,
        }
    }
}
