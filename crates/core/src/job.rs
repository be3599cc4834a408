//! Job lifecycle: states, the transition table, and the `Job` record.
//!
//! The table is the single source of truth for which moves are legal:
//!
//! ```text
//! queued      -> {running, failed}
//! running     -> {succeeded, failed}
//! failed      -> {queued, dead_letter}
//! succeeded   -> {}
//! dead_letter -> {}
//! ```

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, TransitionError};
use crate::id::{CaseId, JobId};

/// Error code recorded when a job fails without a caller-supplied code.
pub const DEFAULT_FAILURE_CODE: &str = "unknown_failure";

/// Job execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting to be claimed.
    Queued,
    /// Claimed by a worker.
    Running,
    /// Finished with a usable output.
    Succeeded,
    /// Attempt failed; may be requeued or dead-lettered by an operator.
    Failed,
    /// Abandoned; requires manual intervention.
    DeadLetter,
}

impl JobState {
    pub const ALL: [JobState; 5] = [
        JobState::Queued,
        JobState::Running,
        JobState::Succeeded,
        JobState::Failed,
        JobState::DeadLetter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::DeadLetter => "dead_letter",
        }
    }

    /// States reachable from `self` in one step.
    pub fn allowed_targets(&self) -> &'static [JobState] {
        match self {
            JobState::Queued => &[JobState::Running, JobState::Failed],
            JobState::Running => &[JobState::Succeeded, JobState::Failed],
            JobState::Failed => &[JobState::Queued, JobState::DeadLetter],
            JobState::Succeeded | JobState::DeadLetter => &[],
        }
    }

    pub fn can_transition_to(&self, target: JobState) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Validate a single move against the table.
    pub fn check_transition(self, target: JobState) -> Result<(), TransitionError> {
        if self.can_transition_to(target) {
            Ok(())
        } else {
            Err(TransitionError {
                from: self,
                to: target,
            })
        }
    }
}

impl core::fmt::Display for JobState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown job state: {s}")))
    }
}

/// Free-form pipeline phase a job represents (e.g. `inference`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobStage(String);

impl JobStage {
    pub const INFERENCE: &'static str = "inference";

    pub fn new(stage: impl Into<String>) -> Result<Self, DomainError> {
        let stage = stage.into();
        let trimmed = stage.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("stage must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn inference() -> Self {
        Self(Self::INFERENCE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for JobStage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of pipeline work attached to a case.
///
/// `(case_id, idempotency_key)` is unique. Mutated only through
/// [`Job::transitioned`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub case_id: CaseId,
    pub stage: JobStage,
    pub state: JobState,
    pub retry_count: u32,
    pub idempotency_key: String,
    pub error_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// A fresh job in `queued` state.
    pub fn queued(
        case_id: CaseId,
        stage: JobStage,
        idempotency_key: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            case_id,
            stage,
            state: JobState::Queued,
            retry_count: 0,
            idempotency_key: idempotency_key.into(),
            error_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Compute the job after moving to `target`.
    ///
    /// - `failed`: retry_count + 1, error_code = supplied or [`DEFAULT_FAILURE_CODE`]
    /// - `succeeded` / `dead_letter`: error_code = supplied (usually `None`)
    /// - anything else: only state and `updated_at` change
    pub fn transitioned(
        &self,
        target: JobState,
        error_code: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Job, TransitionError> {
        self.state.check_transition(target)?;

        let mut next = self.clone();
        next.state = target;
        next.updated_at = now;
        match target {
            JobState::Failed => {
                next.retry_count += 1;
                next.error_code = Some(error_code.unwrap_or_else(|| DEFAULT_FAILURE_CODE.to_string()));
            }
            JobState::Succeeded | JobState::DeadLetter => {
                next.error_code = error_code;
            }
            JobState::Queued | JobState::Running => {}
        }
        Ok(next)
    }
}
