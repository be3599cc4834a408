//! Postgres pool wiring, schema bootstrap, and sqlx error mapping.
//!
//! | SQLx error | SQLSTATE | StoreError |
//! |------------|----------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation { constraint }` |
//! | Database (other) | any | `Storage` |
//! | PoolClosed / RowNotFound / other | n/a | `Storage` |

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::StoreError;

/// Per-case idempotency uniqueness.
pub const JOB_IDEMPOTENCY_CONSTRAINT: &str = "uq_jobs_case_id_idempotency_key";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS cases (
        case_id     UUID PRIMARY KEY,
        subject_ref TEXT NOT NULL,
        status      TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL,
        updated_at  TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        job_id          UUID PRIMARY KEY,
        case_id         UUID NOT NULL REFERENCES cases (case_id),
        stage           TEXT NOT NULL,
        state           TEXT NOT NULL,
        retry_count     INTEGER NOT NULL DEFAULT 0 CHECK (retry_count >= 0),
        idempotency_key TEXT NOT NULL,
        error_code      TEXT NULL,
        created_at      TIMESTAMPTZ NOT NULL,
        updated_at      TIMESTAMPTZ NOT NULL,
        CONSTRAINT uq_jobs_case_id_idempotency_key UNIQUE (case_id, idempotency_key)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_jobs_state_created ON jobs (state, created_at, job_id)",
    r#"
    CREATE TABLE IF NOT EXISTS artifacts (
        artifact_id UUID PRIMARY KEY,
        case_id     UUID NOT NULL REFERENCES cases (case_id),
        kind        TEXT NOT NULL,
        file_name   TEXT NOT NULL,
        locator     TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_artifacts_case_kind ON artifacts (case_id, kind, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS knowledge_docs (
        doc_id         UUID PRIMARY KEY,
        source         TEXT NOT NULL,
        source_version TEXT NOT NULL,
        title          TEXT NOT NULL,
        body           TEXT NOT NULL,
        created_at     TIMESTAMPTZ NOT NULL
    )
    "#,
];

/// Open a pool against `database_url`.
pub async fn connect(database_url: &str) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))
}

/// Create tables and indexes if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    }
    tracing::info!(statements = SCHEMA.len(), "database schema ensured");
    Ok(())
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                return StoreError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                };
            }
            StoreError::Storage(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Storage(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::RowNotFound => {
            StoreError::Storage(format!("unexpected row not found in {}", operation))
        }
        _ => StoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

pub(crate) fn decode_error(what: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Storage(format!("failed to decode {} row: {}", what, err))
}
