//! In-memory descriptor store

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::registry::StreamDescriptor;

use super::{DescriptorStore, StoreError};

/// Descriptor store kept in process memory
///
/// Listing is ordered by stream ID.
#[derive(Debug, Default)]
pub struct MemoryStore {
    descriptors: RwLock<BTreeMap<String, StreamDescriptor>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given descriptors
    ///
    /// Later duplicates of an ID overwrite earlier ones.
    pub fn with_descriptors(descriptors: impl IntoIterator<Item = StreamDescriptor>) -> Self {
        let map = descriptors
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();
        Self {
            descriptors: RwLock::new(map),
        }
    }

    /// Copy of every descriptor, ordered by ID
    pub(super) async fn snapshot(&self) -> Vec<StreamDescriptor> {
        self.descriptors.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl DescriptorStore for MemoryStore {
    async fn list(&self) -> Result<Vec<StreamDescriptor>, StoreError> {
        Ok(self.snapshot().await)
    }

    async fn get(&self, id: &str) -> Result<Option<StreamDescriptor>, StoreError> {
        Ok(self.descriptors.read().await.get(id).cloned())
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<StreamDescriptor>, StoreError> {
        Ok(self
            .descriptors
            .read()
            .await
            .values()
            .find(|d| d.url == url)
            .cloned())
    }

    async fn create(&self, descriptor: &StreamDescriptor) -> Result<(), StoreError> {
        let mut descriptors = self.descriptors.write().await;
        if descriptors.contains_key(&descriptor.id) {
            return Err(StoreError::AlreadyExists(descriptor.id.clone()));
        }
        descriptors.insert(descriptor.id.clone(), descriptor.clone());
        Ok(())
    }

    async fn update(&self, descriptor: &StreamDescriptor) -> Result<(), StoreError> {
        let mut descriptors = self.descriptors.write().await;
        match descriptors.get_mut(&descriptor.id) {
            Some(existing) => {
                *existing = descriptor.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(descriptor.id.clone())),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.descriptors
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
