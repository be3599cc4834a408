//! Postgres-backed knowledge store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use caseflow_core::{DocumentId, KnowledgeDocument};

use super::KnowledgeStore;
use crate::db::{decode_error, map_sqlx_error};
use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct PostgresKnowledgeStore {
    pool: Arc<PgPool>,
}

impl PostgresKnowledgeStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl KnowledgeStore for PostgresKnowledgeStore {
    #[instrument(skip(self, document), fields(doc_id = %document.doc_id), err)]
    async fn insert(&self, document: &KnowledgeDocument) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO knowledge_docs (doc_id, source, source_version, title, body, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(document.doc_id.as_uuid())
        .bind(&document.source)
        .bind(&document.source_version)
        .bind(&document.title)
        .bind(&document.body)
        .bind(document.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_knowledge_doc", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_all(&self) -> Result<Vec<KnowledgeDocument>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT doc_id, source, source_version, title, body, created_at
            FROM knowledge_docs
            ORDER BY created_at ASC, doc_id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_knowledge_docs", e))?;

        rows.iter()
            .map(|row| {
                KnowledgeRow::from_row(row)
                    .map(Into::into)
                    .map_err(|e| decode_error("knowledge_doc", e))
            })
            .collect()
    }
}

// SQLx row types

#[derive(Debug)]
struct KnowledgeRow {
    doc_id: uuid::Uuid,
    source: String,
    source_version: String,
    title: String,
    body: String,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for KnowledgeRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(KnowledgeRow {
            doc_id: row.try_get("doc_id")?,
            source: row.try_get("source")?,
            source_version: row.try_get("source_version")?,
            title: row.try_get("title")?,
            body: row.try_get("body")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<KnowledgeRow> for KnowledgeDocument {
    fn from(row: KnowledgeRow) -> Self {
        KnowledgeDocument {
            doc_id: DocumentId::from_uuid(row.doc_id),
            source: row.source,
            source_version: row.source_version,
            title: row.title,
            body: row.body,
            created_at: row.created_at,
        }
    }
}
