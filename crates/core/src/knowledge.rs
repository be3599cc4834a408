//! Knowledge documents: ingested reference passages used for lexical retrieval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::DocumentId;

pub const DEFAULT_SOURCE_VERSION: &str = "v1";

/// Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub doc_id: DocumentId,
    pub source: String,
    pub source_version: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Ingestion request for a knowledge document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub source: String,
    #[serde(default)]
    pub source_version: Option<String>,
    pub title: String,
    pub body: String,
}

impl NewDocument {
    /// Validate and stamp the document.
    pub fn into_document(self, now: DateTime<Utc>) -> Result<KnowledgeDocument, DomainError> {
        let source = self.source.trim().to_string();
        let title = self.title.trim().to_string();
        if source.is_empty() {
            return Err(DomainError::validation("source must not be empty"));
        }
        if title.is_empty() {
            return Err(DomainError::validation("title must not be empty"));
        }
        if self.body.trim().is_empty() {
            return Err(DomainError::validation("body must not be empty"));
        }
        let source_version = self
            .source_version
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCE_VERSION.to_string());

        Ok(KnowledgeDocument {
            doc_id: DocumentId::new(),
            source,
            source_version,
            title,
            body: self.body,
            created_at: now,
        })
    }
}
