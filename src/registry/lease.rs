//! Worker leases
//!
//! At most one ingestion worker may own a stream at a time. A worker holds a
//! lease obtained from [`StreamRegistry::claim_worker`]; the lease carries a
//! generation number so that a worker outliving its entry (because the stream
//! was replaced or removed) can never release the replacement's claim.
//!
//! [`StreamRegistry::claim_worker`]: super::StreamRegistry::claim_worker

use tokio::sync::watch;

/// Exclusive right to run the ingestion worker of one stream
#[derive(Debug)]
pub struct WorkerLease {
    pub(super) stream_id: String,
    pub(super) generation: u64,
    stop: watch::Receiver<bool>,
}

impl WorkerLease {
    pub(super) fn new(stream_id: String, generation: u64, stop: watch::Receiver<bool>) -> Self {
        Self {
            stream_id,
            generation,
            stop,
        }
    }

    /// Stream this lease belongs to
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Generation number of this lease
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the operator asked the worker to stop, or the entry is gone
    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow() || self.stop.has_changed().is_err()
    }

    /// Resolves once the worker should stop
    ///
    /// Fires on an explicit stop request and when the stream entry is
    /// replaced or removed (the sender is dropped with the entry).
    pub async fn stopped(&mut self) {
        loop {
            if *self.stop.borrow_and_update() {
                return;
            }
            if self.stop.changed().await.is_err() {
                return;
            }
        }
    }
}
