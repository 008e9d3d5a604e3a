//! Viewer sessions
//!
//! The protocol muxer that talks to a viewer (WebRTC in practice) is an
//! external collaborator consumed through [`SessionNegotiator`] and
//! [`ViewerSession`]. This module also provides the loop that drains a
//! viewer's delivery queue into its session.

pub mod connection;

use async_trait::async_trait;
use thiserror::Error;

use crate::media::{Codec, MediaUnit};

pub use connection::{ViewerConnection, ViewerExit};

/// Options for creating a viewer session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// STUN/TURN server URLs
    pub ice_servers: Vec<String>,
    /// TURN username
    pub ice_username: Option<String>,
    /// TURN credential
    pub ice_credential: Option<String>,
    /// Lowest local UDP port (0 = unrestricted)
    pub port_min: u16,
    /// Highest local UDP port (0 = unrestricted)
    pub port_max: u16,
}

/// Failure reported by a viewer session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Offer/answer exchange failed
    #[error("Session negotiation failed: {0}")]
    Negotiation(String),

    /// Writing a unit to the peer failed
    #[error("Session write failed: {0}")]
    Write(String),

    /// The peer went away
    #[error("Session closed")]
    Closed,
}

/// Creates viewer sessions
pub trait SessionNegotiator: Send + Sync {
    /// Create an unnegotiated session
    fn create_session(&self, options: &SessionOptions) -> Box<dyn ViewerSession>;
}

/// One outbound session to a viewer
#[async_trait]
pub trait ViewerSession: Send {
    /// Answer the viewer's offer for the given tracks
    async fn negotiate(&mut self, codecs: &[Codec], offer: &str) -> Result<String, SessionError>;

    /// Write one unit to the viewer
    async fn write_unit(&mut self, unit: &MediaUnit) -> Result<(), SessionError>;

    /// Tear the session down
    async fn close(&mut self);
}
