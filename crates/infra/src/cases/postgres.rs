//! Postgres-backed case and artifact stores.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use caseflow_core::{Artifact, ArtifactId, ArtifactKind, BlobLocator, Case, CaseId};

use super::{ArtifactStore, CaseStore};
use crate::db::{decode_error, map_sqlx_error};
use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct PostgresCaseStore {
    pool: Arc<PgPool>,
}

impl PostgresCaseStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl CaseStore for PostgresCaseStore {
    #[instrument(skip(self, case), fields(case_id = %case.case_id), err)]
    async fn insert(&self, case: &Case) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO cases (case_id, subject_ref, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(case.case_id.as_uuid())
        .bind(&case.subject_ref)
        .bind(case.status.as_str())
        .bind(case.created_at)
        .bind(case.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_case", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(case_id = %case_id), err)]
    async fn get(&self, case_id: CaseId) -> Result<Option<Case>, StoreError> {
        let row = sqlx::query(
            "SELECT case_id, subject_ref, status, created_at, updated_at FROM cases WHERE case_id = $1",
        )
        .bind(case_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_case", e))?;

        row.as_ref()
            .map(|row| {
                CaseRow::from_row(row)
                    .map_err(|e| decode_error("case", e))?
                    .try_into()
            })
            .transpose()
    }

    #[instrument(skip(self), fields(case_id = %case_id), err)]
    async fn delete(&self, case_id: CaseId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM cases WHERE case_id = $1")
            .bind(case_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_case", e))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresArtifactStore {
    pool: Arc<PgPool>,
}

impl PostgresArtifactStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl ArtifactStore for PostgresArtifactStore {
    #[instrument(skip(self, artifact), fields(case_id = %artifact.case_id, kind = %artifact.kind), err)]
    async fn insert(&self, artifact: &Artifact) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO artifacts (artifact_id, case_id, kind, file_name, locator, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(artifact.artifact_id.as_uuid())
        .bind(artifact.case_id.as_uuid())
        .bind(artifact.kind.as_str())
        .bind(&artifact.file_name)
        .bind(artifact.locator.as_str())
        .bind(artifact.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_artifact", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(case_id = %case_id, kind = %kind), err)]
    async fn list(&self, case_id: CaseId, kind: ArtifactKind) -> Result<Vec<Artifact>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT artifact_id, case_id, kind, file_name, locator, created_at
            FROM artifacts
            WHERE case_id = $1 AND kind = $2
            ORDER BY created_at ASC, artifact_id ASC
            "#,
        )
        .bind(case_id.as_uuid())
        .bind(kind.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_artifacts", e))?;

        rows.iter()
            .map(|row| {
                ArtifactRow::from_row(row)
                    .map_err(|e| decode_error("artifact", e))?
                    .try_into()
            })
            .collect()
    }

    #[instrument(skip(self), fields(case_id = %case_id), err)]
    async fn delete_for_case(&self, case_id: CaseId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM artifacts WHERE case_id = $1")
            .bind(case_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_artifacts", e))?;
        Ok(())
    }
}

// SQLx row types

#[derive(Debug)]
struct CaseRow {
    case_id: uuid::Uuid,
    subject_ref: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for CaseRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(CaseRow {
            case_id: row.try_get("case_id")?,
            subject_ref: row.try_get("subject_ref")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<CaseRow> for Case {
    type Error = StoreError;

    fn try_from(row: CaseRow) -> Result<Self, Self::Error> {
        Ok(Case {
            case_id: CaseId::from_uuid(row.case_id),
            subject_ref: row.subject_ref,
            status: row.status.parse().map_err(|e| decode_error("case", e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug)]
struct ArtifactRow {
    artifact_id: uuid::Uuid,
    case_id: uuid::Uuid,
    kind: String,
    file_name: String,
    locator: String,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ArtifactRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ArtifactRow {
            artifact_id: row.try_get("artifact_id")?,
            case_id: row.try_get("case_id")?,
            kind: row.try_get("kind")?,
            file_name: row.try_get("file_name")?,
            locator: row.try_get("locator")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<ArtifactRow> for Artifact {
    type Error = StoreError;

    fn try_from(row: ArtifactRow) -> Result<Self, Self::Error> {
        Ok(Artifact {
            artifact_id: ArtifactId::from_uuid(row.artifact_id),
            case_id: CaseId::from_uuid(row.case_id),
            kind: row.kind.parse().map_err(|e| decode_error("artifact", e))?,
            file_name: row.file_name,
            locator: BlobLocator::new(row.locator),
            created_at: row.created_at,
        })
    }
}
