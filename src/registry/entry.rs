//! Stream entry and state types
//!
//! This module defines the per-stream state stored in the registry. Entries
//! never leave the registry; callers only see [`StreamStats`] snapshots,
//! cloned codec sequences, or viewer queue handles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::{mpsc, watch};

use crate::media::{Codec, MediaUnit};
use crate::source::{ExitReason, WorkerState};

use super::descriptor::StreamDescriptor;

/// Outcome of delivering one unit to every viewer of a stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    /// Viewers whose queue accepted the unit
    pub delivered: usize,
    /// Viewers whose queue was full or closed
    pub dropped: usize,
}

/// Entry for a single stream in the registry
pub(crate) struct StreamEntry {
    /// Descriptor (None for streams created implicitly by a viewer attach)
    pub descriptor: Option<StreamDescriptor>,

    /// Codecs of the current connection (None until discovered)
    pub codecs: Option<Vec<Codec>>,

    /// Whether an ingestion worker currently owns this stream
    pub running: bool,

    /// Generation of the worker lease currently held
    pub worker_generation: u64,

    /// Stop signal for the current worker; dropping it also stops the worker
    pub worker_stop: Option<watch::Sender<bool>>,

    /// Last reported worker state
    pub worker_state: Option<WorkerState>,

    /// Viewer ID to delivery queue
    pub viewers: HashMap<String, mpsc::Sender<MediaUnit>>,

    /// Most recent ingestion failure
    pub last_error: Option<ExitReason>,

    /// Units handed to at least the fan-out (delivered or dropped)
    pub units_broadcast: AtomicU64,

    /// Per-viewer deliveries skipped because a queue was full
    pub units_dropped: AtomicU64,

    /// When the entry was created
    pub created_at: Instant,
}

impl StreamEntry {
    /// Create an entry for a registered descriptor
    pub fn new(descriptor: Option<StreamDescriptor>) -> Self {
        Self {
            descriptor,
            codecs: None,
            running: false,
            worker_generation: 0,
            worker_stop: None,
            worker_state: None,
            viewers: HashMap::new(),
            last_error: None,
            units_broadcast: AtomicU64::new(0),
            units_dropped: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    /// Get the number of attached viewers
    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Push a unit into every viewer queue without waiting
    ///
    /// A full queue drops the unit for that viewer only.
    pub fn fan_out(&self, unit: &MediaUnit) -> FanOut {
        let mut result = FanOut::default();

        for tx in self.viewers.values() {
            match tx.try_send(unit.clone()) {
                Ok(()) => result.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_))
                | Err(mpsc::error::TrySendError::Closed(_)) => result.dropped += 1,
            }
        }

        self.units_broadcast.fetch_add(1, Ordering::Relaxed);
        if result.dropped > 0 {
            self.units_dropped
                .fetch_add(result.dropped as u64, Ordering::Relaxed);
        }

        result
    }

    /// Snapshot of this entry
    pub fn stats(&self) -> StreamStats {
        StreamStats {
            viewer_count: self.viewer_count(),
            running: self.running,
            worker_state: self.worker_state,
            has_codecs: self.codecs.is_some(),
            on_demand: self.descriptor.as_ref().is_some_and(|d| d.on_demand),
            units_broadcast: self.units_broadcast.load(Ordering::Relaxed),
            units_dropped: self.units_dropped.load(Ordering::Relaxed),
            last_error: self.last_error.clone(),
            age: self.created_at.elapsed(),
        }
    }
}

/// Statistics for a stream
#[derive(Debug, Clone)]
pub struct StreamStats {
    /// Number of attached viewers
    pub viewer_count: usize,
    /// Whether an ingestion worker is running
    pub running: bool,
    /// Last reported worker state (None if no worker ever ran)
    pub worker_state: Option<WorkerState>,
    /// Whether codecs have been discovered for the current connection
    pub has_codecs: bool,
    /// Whether the stream is on-demand
    pub on_demand: bool,
    /// Units fanned out since the entry was created
    pub units_broadcast: u64,
    /// Per-viewer drops since the entry was created
    pub units_dropped: u64,
    /// Most recent ingestion failure
    pub last_error: Option<ExitReason>,
    /// Time since the entry was created or replaced
    pub age: std::time::Duration,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;

    fn unit() -> MediaUnit {
        MediaUnit::keyframe(Duration::ZERO, Bytes::from_static(&[0x65]))
    }

    #[test]
    fn test_fan_out_counts_drops() {
        let mut entry = StreamEntry::new(None);
        let (tx_a, mut rx_a) = mpsc::channel(1);
        let (tx_b, _rx_b) = mpsc::channel(1);
        entry.viewers.insert("a".into(), tx_a);
        entry.viewers.insert("b".into(), tx_b);

        assert_eq!(entry.fan_out(&unit()), FanOut { delivered: 2, dropped: 0 });

        // Drain only viewer a; b stays full
        rx_a.try_recv().unwrap();
        assert_eq!(entry.fan_out(&unit()), FanOut { delivered: 1, dropped: 1 });

        let stats = entry.stats();
        assert_eq!(stats.units_broadcast, 2);
        assert_eq!(stats.units_dropped, 1);
        assert_eq!(stats.viewer_count, 2);
    }

    #[test]
    fn test_fan_out_without_viewers() {
        let entry = StreamEntry::new(None);

        assert_eq!(entry.fan_out(&unit()), FanOut::default());
        assert_eq!(entry.stats().units_broadcast, 1);
    }
}
