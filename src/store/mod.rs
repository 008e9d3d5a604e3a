//! Stream descriptor persistence
//!
//! The backing store for stream definitions is an external collaborator. The
//! manager only needs CRUD over descriptors plus the list of always-on
//! streams used to seed the registry at startup.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::registry::StreamDescriptor;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Failure reported by a descriptor store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No descriptor with this ID
    #[error("Stream not found: {0}")]
    NotFound(String),

    /// A descriptor with this ID already exists
    #[error("Stream already exists: {0}")]
    AlreadyExists(String),

    /// The backing storage failed
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// CRUD over stream descriptors
#[async_trait]
pub trait DescriptorStore: Send + Sync {
    /// All descriptors
    async fn list(&self) -> Result<Vec<StreamDescriptor>, StoreError>;

    /// Descriptor by ID
    async fn get(&self, id: &str) -> Result<Option<StreamDescriptor>, StoreError>;

    /// Descriptor by source address
    async fn find_by_url(&self, url: &str) -> Result<Option<StreamDescriptor>, StoreError>;

    /// Insert a new descriptor
    async fn create(&self, descriptor: &StreamDescriptor) -> Result<(), StoreError>;

    /// Overwrite an existing descriptor
    async fn update(&self, descriptor: &StreamDescriptor) -> Result<(), StoreError>;

    /// Delete a descriptor
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Descriptors whose ingestion runs continuously
    async fn list_always_on(&self) -> Result<Vec<StreamDescriptor>, StoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|d| !d.on_demand)
            .collect())
    }
}
