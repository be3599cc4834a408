use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use caseflow_core::{BlobLocator, CaseId};

use super::{BlobError, BlobStore, sanitize_name};

/// In-memory blobs for tests/dev, addressed as `mem://<case_id>/<uuid>/<name>`.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }
}

#[async_trait::async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put_bytes(
        &self,
        case_id: CaseId,
        name: &str,
        bytes: &[u8],
    ) -> Result<BlobLocator, BlobError> {
        let name = sanitize_name(name)?;
        let locator = format!("mem://{}/{}/{}", case_id, Uuid::now_v7().simple(), name);
        self.blobs.lock().await.insert(locator.clone(), bytes.to_vec());
        Ok(BlobLocator::new(locator))
    }

    async fn get(&self, locator: &BlobLocator) -> Result<Option<Vec<u8>>, BlobError> {
        Ok(self.blobs.lock().await.get(locator.as_str()).cloned())
    }

    async fn exists(&self, locator: &BlobLocator) -> Result<bool, BlobError> {
        Ok(self.blobs.lock().await.contains_key(locator.as_str()))
    }

    async fn delete(&self, locator: &BlobLocator) -> Result<(), BlobError> {
        self.blobs.lock().await.remove(locator.as_str());
        Ok(())
    }
}
