//! JSON file descriptor store
//!
//! Keeps descriptors in memory and rewrites the whole file after every
//! mutation. The file holds a JSON array of descriptors.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;

use crate::registry::StreamDescriptor;

use super::{DescriptorStore, MemoryStore, StoreError};

/// Descriptor store persisted to a JSON file
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
    /// Serializes mutate-then-write so the file matches the last mutation
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store, loading the file if it exists
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let descriptors: Vec<StreamDescriptor> = match fs::read(&path).await {
            Ok(data) => serde_json::from_slice(&data)
                .map_err(|e| StoreError::Backend(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StoreError::Backend(format!("{}: {}", path.display(), e))),
        };

        tracing::debug!(path = %path.display(), streams = descriptors.len(), "Descriptor store loaded");

        Ok(Self {
            path,
            inner: MemoryStore::with_descriptors(descriptors),
            write_lock: Mutex::new(()),
        })
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let descriptors = self.inner.snapshot().await;
        let data = serde_json::to_vec_pretty(&descriptors)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        fs::write(&self.path, data)
            .await
            .map_err(|e| StoreError::Backend(format!("{}: {}", self.path.display(), e)))?;

        tracing::trace!(path = %self.path.display(), streams = descriptors.len(), "Descriptor store written");
        Ok(())
    }
}

#[async_trait]
impl DescriptorStore for JsonFileStore {
    async fn list(&self) -> Result<Vec<StreamDescriptor>, StoreError> {
        self.inner.list().await
    }

    async fn get(&self, id: &str) -> Result<Option<StreamDescriptor>, StoreError> {
        self.inner.get(id).await
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<StreamDescriptor>, StoreError> {
        self.inner.find_by_url(url).await
    }

    async fn create(&self, descriptor: &StreamDescriptor) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.inner.create(descriptor).await?;
        self.persist().await
    }

    async fn update(&self, descriptor: &StreamDescriptor) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.inner.update(descriptor).await?;
        self.persist().await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.inner.delete(id).await?;
        self.persist().await
    }
}
