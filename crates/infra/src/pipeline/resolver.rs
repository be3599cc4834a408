//! Finds the persisted output that belongs to a job.
//!
//! A case can carry several outputs (one per job, plus re-runs). Payloads are
//! matched on their embedded `job_id`; a payload without one predates job tagging
//! and is used only when nothing matches exactly.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::debug;

use caseflow_core::{ArtifactKind, JobId};

use super::PipelineError;
use crate::blob::BlobStore;
use crate::cases::ArtifactStore;
use crate::jobs::JobStore;

#[derive(Clone)]
pub struct OutputResolver {
    jobs: Arc<dyn JobStore>,
    artifacts: Arc<dyn ArtifactStore>,
    blobs: Arc<dyn BlobStore>,
}

impl OutputResolver {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        artifacts: Arc<dyn ArtifactStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            jobs,
            artifacts,
            blobs,
        }
    }

    /// The job's output payload, or `None` while there is nothing to show yet.
    pub async fn resolve(&self, job_id: JobId) -> Result<Option<JsonValue>, PipelineError> {
        let Some(job) = self.jobs.get(job_id).await? else {
            return Ok(None);
        };

        let mut outputs = self.artifacts.list(job.case_id, ArtifactKind::AgentOutput).await?;
        outputs.reverse();

        let wanted = job_id.to_string();
        let mut legacy: Option<JsonValue> = None;

        for artifact in &outputs {
            let Some(bytes) = self.blobs.get(&artifact.locator).await? else {
                continue;
            };
            let Ok(payload) = serde_json::from_slice::<JsonValue>(&bytes) else {
                debug!(artifact_id = %artifact.artifact_id, "skipping unreadable output");
                continue;
            };
            if !payload.is_object() {
                continue;
            }

            match payload.get("job_id") {
                None | Some(JsonValue::Null) => {
                    if legacy.is_none() {
                        legacy = Some(payload);
                    }
                }
                Some(JsonValue::String(id)) if *id == wanted => return Ok(Some(payload)),
                Some(_) => {}
            }
        }

        if legacy.is_some() {
            debug!(job_id = %job_id, "falling back to untagged output");
        }
        Ok(legacy)
    }
}
