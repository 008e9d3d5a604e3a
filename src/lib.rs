//! camrelay: camera stream registry and broadcast lifecycle manager
//!
//! Ingests live media from networked cameras and fans it out to any number
//! of viewers, starting and stopping source connections on demand.
//!
//! The protocol client that dials cameras, the session muxer that talks to
//! viewers, and descriptor persistence are collaborators plugged in through
//! [`source::SourceClient`], [`viewer::SessionNegotiator`] and
//! [`store::DescriptorStore`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use camrelay::{AppConfig, MemoryStore, StreamManager, StreamRegistry};
//! # use camrelay::source::SourceClient;
//! # use camrelay::viewer::SessionNegotiator;
//!
//! # async fn run(
//! #     source: Arc<dyn SourceClient>,
//! #     negotiator: Arc<dyn SessionNegotiator>,
//! # ) -> camrelay::Result<()> {
//! let config = AppConfig::from_json(r#"{"streams":{"cam-1":{"url":"rtsp://cam.local/1"}}}"#)?;
//!
//! let manager = StreamManager::new(
//!     Arc::new(StreamRegistry::new()),
//!     source,
//!     negotiator,
//!     Arc::new(MemoryStore::new()),
//! )
//! .with_session_options(config.server.session_options());
//!
//! manager.start(config.descriptors()).await?;
//! let answer = manager.open_viewer("cam-1", "<sdp offer>").await?;
//! println!("viewer {} tracks {:?}", answer.viewer_id, answer.tracks);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod media;
pub mod registry;
pub mod source;
pub mod stats;
pub mod store;
pub mod viewer;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AppConfig, Args, ServerConfig};
pub use error::{Error, Result};
pub use lifecycle::{LifecycleConfig, StreamManager, ViewerAnswer};
pub use media::{Codec, CodecKind, MediaUnit, TrackKind};
pub use registry::{RegistryConfig, StreamDescriptor, StreamRegistry};
pub use source::ExitReason;
pub use store::{DescriptorStore, JsonFileStore, MemoryStore};
