use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::debug;
use uuid::Uuid;

use caseflow_core::{BlobLocator, CaseId};

use super::{BlobError, BlobStore, sanitize_name};

/// Blobs as files under `<root>/<case_id>/<uuid>_<name>`; the locator is the path.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

fn io_error(err: std::io::Error) -> BlobError {
    BlobError::Io(err.to_string())
}

#[async_trait::async_trait]
impl BlobStore for LocalBlobStore {
    async fn put_bytes(
        &self,
        case_id: CaseId,
        name: &str,
        bytes: &[u8],
    ) -> Result<BlobLocator, BlobError> {
        let name = sanitize_name(name)?;
        let dir = self.root.join(case_id.to_string());
        tokio::fs::create_dir_all(&dir).await.map_err(io_error)?;

        let path = dir.join(format!("{}_{}", Uuid::now_v7().simple(), name));
        tokio::fs::write(&path, bytes).await.map_err(io_error)?;
        debug!(case_id = %case_id, path = %path.display(), bytes = bytes.len(), "blob written");

        Ok(BlobLocator::new(path.to_string_lossy().into_owned()))
    }

    async fn get(&self, locator: &BlobLocator) -> Result<Option<Vec<u8>>, BlobError> {
        match tokio::fs::read(locator.as_str()).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(e)),
        }
    }

    async fn exists(&self, locator: &BlobLocator) -> Result<bool, BlobError> {
        tokio::fs::try_exists(locator.as_str()).await.map_err(io_error)
    }

    async fn delete(&self, locator: &BlobLocator) -> Result<(), BlobError> {
        match tokio::fs::remove_file(locator.as_str()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }
}
