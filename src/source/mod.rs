//! Source client contract and ingestion
//!
//! The protocol client that dials a camera is an external collaborator. It is
//! consumed through [`SourceClient`], which yields a [`SourceConnection`]: the
//! codecs known at handshake time plus two channels, one for lifecycle
//! signals and one for media units.
//!
//! Client implementations build connections with [`SourceConnection::channel`]
//! and drive the returned [`SourceFeed`] from their own reader task.

pub mod error;
pub mod worker;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::media::{Codec, MediaUnit};

pub use error::{ExitReason, SourceError};
pub use worker::{IngestWorker, WorkerState};

/// Capacity of the media unit channel between a client and its worker
pub const UNIT_CHANNEL_CAPACITY: usize = 512;

/// Capacity of the signal channel between a client and its worker
pub const SIGNAL_CHANNEL_CAPACITY: usize = 16;

/// Options passed to the source client when dialing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialOptions {
    /// Skip audio tracks
    pub disable_audio: bool,
    /// Bound on establishing the connection
    pub dial_timeout: Duration,
    /// Bound on each read or write during the handshake and streaming
    pub read_write_timeout: Duration,
    /// Verbose client logging
    pub debug: bool,
}

/// Lifecycle signal emitted by a live connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSignal {
    /// The source renegotiated its tracks
    CodecUpdate(Vec<Codec>),
    /// The source stopped sending
    Disconnected,
}

/// Protocol client able to open source connections
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Dial a source and complete the protocol handshake
    async fn dial(&self, url: &str, options: &DialOptions) -> Result<SourceConnection, SourceError>;
}

/// A live connection to a source
///
/// Dropping the connection (or calling [`close`](Self::close)) tells the
/// client to release the underlying transport.
#[derive(Debug)]
pub struct SourceConnection {
    /// Codecs known at handshake time (None until signaled)
    pub codecs: Option<Vec<Codec>>,
    /// Lifecycle signals
    pub signals: mpsc::Receiver<SourceSignal>,
    /// Media units in emission order
    pub units: mpsc::Receiver<MediaUnit>,
    close: Option<oneshot::Sender<()>>,
}

impl SourceConnection {
    /// Create a connection and the feed a client uses to drive it
    pub fn channel(codecs: Option<Vec<Codec>>) -> (Self, SourceFeed) {
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        let (unit_tx, unit_rx) = mpsc::channel(UNIT_CHANNEL_CAPACITY);
        let (close_tx, close_rx) = oneshot::channel();

        let connection = Self {
            codecs,
            signals: signal_rx,
            units: unit_rx,
            close: Some(close_tx),
        };
        let feed = SourceFeed {
            signals: signal_tx,
            units: unit_tx,
            closed: close_rx,
        };

        (connection, feed)
    }

    /// Release the connection
    pub fn close(mut self) {
        self.notify_close();
    }

    fn notify_close(&mut self) {
        if let Some(tx) = self.close.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for SourceConnection {
    fn drop(&mut self) {
        self.notify_close();
    }
}

/// Client side of a [`SourceConnection`]
#[derive(Debug)]
pub struct SourceFeed {
    /// Send lifecycle signals
    pub signals: mpsc::Sender<SourceSignal>,
    /// Send media units
    pub units: mpsc::Sender<MediaUnit>,
    /// Resolves when the worker releases the connection
    pub closed: oneshot::Receiver<()>,
}
