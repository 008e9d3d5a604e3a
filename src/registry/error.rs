//! Registry error types
//!
//! Errors surfaced synchronously to callers of registry and discovery
//! operations. Ingestion failures are not errors here; they are recorded as
//! the stream's last error instead.

use thiserror::Error;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Stream not found
    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    /// Codec discovery gate exhausted its polling budget
    #[error("Codec discovery timed out for stream: {0}")]
    CodecTimeout(String),
}
