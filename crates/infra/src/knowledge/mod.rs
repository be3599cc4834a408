//! Knowledge document storage and lexical search.

pub mod postgres;

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use caseflow_ai::{ScoredDocument, score_documents};
use caseflow_core::{DomainError, KnowledgeDocument, NewDocument};

use crate::error::StoreError;

pub use postgres::PostgresKnowledgeStore;

/// Characters of body text exposed in search responses.
pub const SNIPPET_CHARS: usize = 200;

#[async_trait::async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn insert(&self, document: &KnowledgeDocument) -> Result<(), StoreError>;

    /// Every document in stable store order (ingestion order).
    async fn list_all(&self) -> Result<Vec<KnowledgeDocument>, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryKnowledgeStore {
    documents: Mutex<Vec<KnowledgeDocument>>,
}

impl InMemoryKnowledgeStore {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait::async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn insert(&self, document: &KnowledgeDocument) -> Result<(), StoreError> {
        self.documents.lock().await.push(document.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<KnowledgeDocument>, StoreError> {
        Ok(self.documents.lock().await.clone())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KnowledgeError {
    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Ingestion and scoring over a [`KnowledgeStore`].
#[derive(Clone)]
pub struct KnowledgeIndex {
    store: Arc<dyn KnowledgeStore>,
}

impl KnowledgeIndex {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }

    pub async fn ingest(&self, new: NewDocument) -> Result<KnowledgeDocument, KnowledgeError> {
        let document = new.into_document(Utc::now())?;
        self.store.insert(&document).await?;
        info!(doc_id = %document.doc_id, source = %document.source, "knowledge document ingested");
        Ok(document)
    }

    /// Top `top_k` documents for `query`; an empty query never touches the store.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredDocument>, StoreError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let documents = self.store.list_all().await?;
        let hits = score_documents(query, &documents, top_k);
        debug!(candidates = documents.len(), hits = hits.len(), top_k, "knowledge search");
        Ok(hits)
    }
}

/// First `max_chars` characters of `body`.
pub fn snippet(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}
