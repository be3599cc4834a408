//! Case: the subject/episode under evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::CaseId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Open,
    Closed,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Open => "open",
            CaseStatus::Closed => "closed",
        }
    }
}

impl core::str::FromStr for CaseStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(CaseStatus::Open),
            "closed" => Ok(CaseStatus::Closed),
            other => Err(DomainError::validation(format!("unknown case status: {other}"))),
        }
    }
}

/// A case owns jobs and artifacts by reference; it is never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub case_id: CaseId,
    /// Pseudonymous subject reference (never a real identity).
    pub subject_ref: String,
    pub status: CaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Case {
    pub const MAX_SUBJECT_REF_LEN: usize = 128;

    /// Open a new case for a pseudonymous subject.
    pub fn open(subject_ref: impl Into<String>, now: DateTime<Utc>) -> Result<Self, DomainError> {
        let subject_ref = subject_ref.into().trim().to_string();
        if subject_ref.is_empty() {
            return Err(DomainError::validation("subject reference must not be empty"));
        }
        if subject_ref.chars().count() > Self::MAX_SUBJECT_REF_LEN {
            return Err(DomainError::validation(format!(
                "subject reference longer than {} characters",
                Self::MAX_SUBJECT_REF_LEN
            )));
        }
        Ok(Self {
            case_id: CaseId::new(),
            subject_ref,
            status: CaseStatus::Open,
            created_at: now,
            updated_at: now,
        })
    }
}
