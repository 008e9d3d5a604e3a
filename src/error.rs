//! Crate-wide error type

use thiserror::Error;

use crate::config::ConfigError;
use crate::registry::RegistryError;
use crate::store::StoreError;
use crate::viewer::SessionError;

/// Error returned by manager operations
#[derive(Debug, Error)]
pub enum Error {
    /// Stream lookup or codec discovery failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Viewer session negotiation failed
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Descriptor persistence failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for manager operations
pub type Result<T> = std::result::Result<T, Error>;
