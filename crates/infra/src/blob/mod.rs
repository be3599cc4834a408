//! Write-once blob storage for case inputs and outputs.
//!
//! Every `put` lands at a fresh locator, so a blob is never overwritten. Reading a
//! locator that no longer exists yields `None`, not an error.

pub mod local;
pub mod memory;

use thiserror::Error;

use caseflow_core::{BlobLocator, CaseId};

pub use local::LocalBlobStore;
pub use memory::InMemoryBlobStore;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BlobError {
    #[error("invalid blob name: {0:?}")]
    InvalidName(String),

    #[error("blob i/o failed: {0}")]
    Io(String),

    #[error("blob content is not valid {0}")]
    Encoding(&'static str),
}

#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    async fn put_bytes(
        &self,
        case_id: CaseId,
        name: &str,
        bytes: &[u8],
    ) -> Result<BlobLocator, BlobError>;

    async fn get(&self, locator: &BlobLocator) -> Result<Option<Vec<u8>>, BlobError>;

    async fn exists(&self, locator: &BlobLocator) -> Result<bool, BlobError>;

    /// Removing an absent blob succeeds.
    async fn delete(&self, locator: &BlobLocator) -> Result<(), BlobError>;

    async fn put_text(&self, case_id: CaseId, name: &str, text: &str) -> Result<BlobLocator, BlobError> {
        self.put_bytes(case_id, name, text.as_bytes()).await
    }

    async fn put_json(
        &self,
        case_id: CaseId,
        name: &str,
        value: &serde_json::Value,
    ) -> Result<BlobLocator, BlobError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|_| BlobError::Encoding("json"))?;
        self.put_bytes(case_id, name, &bytes).await
    }

    async fn get_text(&self, locator: &BlobLocator) -> Result<Option<String>, BlobError> {
        match self.get(locator).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| BlobError::Encoding("utf-8")),
            None => Ok(None),
        }
    }
}

/// Final path component of a caller-supplied name; rejects empty and dot names.
pub(crate) fn sanitize_name(name: &str) -> Result<String, BlobError> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if base.is_empty() || base == "." || base == ".." {
        return Err(BlobError::InvalidName(name.to_string()));
    }
    Ok(base.to_string())
}
