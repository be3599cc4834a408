//! Postgres-backed job store.
//!
//! Claim is a single `UPDATE ... WHERE job_id = (SELECT ... FOR UPDATE SKIP LOCKED)`;
//! concurrent claimers skip rows another transaction already holds. Advance is a
//! conditional `UPDATE` guarded by the observed `(state, retry_count)`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use caseflow_core::{CaseId, Job, JobId, JobStage, JobState};

use super::store::{JobStore, QueueStats};
use crate::db::{decode_error, map_sqlx_error};
use crate::error::StoreError;

const JOB_COLUMNS: &str =
    "job_id, case_id, stage, state, retry_count, idempotency_key, error_code, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: Arc<PgPool>,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    fn decode(row: &sqlx::postgres::PgRow) -> Result<Job, StoreError> {
        JobRow::from_row(row)
            .map_err(|e| decode_error("job", e))?
            .try_into()
    }
}

#[async_trait::async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip(self, job), fields(job_id = %job.job_id, case_id = %job.case_id), err)]
    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                job_id, case_id, stage, state, retry_count,
                idempotency_key, error_code, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(job.job_id.as_uuid())
        .bind(job.case_id.as_uuid())
        .bind(job.stage.as_str())
        .bind(job.state.as_str())
        .bind(job.retry_count as i32)
        .bind(&job.idempotency_key)
        .bind(&job.error_code)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_job", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn get(&self, job_id: JobId) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = $1"))
            .bind(job_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_job", e))?;
        row.as_ref().map(Self::decode).transpose()
    }

    #[instrument(skip(self), fields(case_id = %case_id), err)]
    async fn find_by_idempotency_key(
        &self,
        case_id: CaseId,
        idempotency_key: &str,
    ) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE case_id = $1 AND idempotency_key = $2"
        ))
        .bind(case_id.as_uuid())
        .bind(idempotency_key)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_idempotency_key", e))?;
        row.as_ref().map(Self::decode).transpose()
    }

    #[instrument(skip(self, current, next), fields(job_id = %current.job_id, to = %next.state), err)]
    async fn compare_and_swap(&self, current: &Job, next: &Job) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = $1, retry_count = $2, error_code = $3, updated_at = $4
            WHERE job_id = $5 AND state = $6 AND retry_count = $7
            "#,
        )
        .bind(next.state.as_str())
        .bind(next.retry_count as i32)
        .bind(&next.error_code)
        .bind(next.updated_at)
        .bind(current.job_id.as_uuid())
        .bind(current.state.as_str())
        .bind(current.retry_count as i32)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("advance_job", e))?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), err)]
    async fn claim_oldest_queued(&self, now: DateTime<Utc>) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE jobs
            SET state = 'running', updated_at = $1
            WHERE job_id = (
                SELECT job_id FROM jobs
                WHERE state = 'queued'
                ORDER BY created_at ASC, job_id ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(now)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("claim_job", e))?;
        row.as_ref().map(Self::decode).transpose()
    }

    #[instrument(skip(self), err)]
    async fn stats(&self) -> Result<QueueStats, StoreError> {
        let rows = sqlx::query("SELECT state, COUNT(*) AS n FROM jobs GROUP BY state")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("job_stats", e))?;

        let mut stats = QueueStats::default();
        for row in rows {
            let state: String = row.try_get("state").map_err(|e| decode_error("job_stats", e))?;
            let n: i64 = row.try_get("n").map_err(|e| decode_error("job_stats", e))?;
            let state: JobState = state.parse().map_err(|e| decode_error("job_stats", e))?;
            stats.record(state, n as usize);
        }
        Ok(stats)
    }
}

// SQLx row types

#[derive(Debug)]
struct JobRow {
    job_id: uuid::Uuid,
    case_id: uuid::Uuid,
    stage: String,
    state: String,
    retry_count: i32,
    idempotency_key: String,
    error_code: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for JobRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(JobRow {
            job_id: row.try_get("job_id")?,
            case_id: row.try_get("case_id")?,
            stage: row.try_get("stage")?,
            state: row.try_get("state")?,
            retry_count: row.try_get("retry_count")?,
            idempotency_key: row.try_get("idempotency_key")?,
            error_code: row.try_get("error_code")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            job_id: JobId::from_uuid(row.job_id),
            case_id: CaseId::from_uuid(row.case_id),
            stage: JobStage::new(row.stage).map_err(|e| decode_error("job", e))?,
            state: row.state.parse().map_err(|e| decode_error("job", e))?,
            retry_count: u32::try_from(row.retry_count).map_err(|e| decode_error("job", e))?,
            idempotency_key: row.idempotency_key,
            error_code: row.error_code,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
