//! Statistics for ingestion and the registry

use std::time::{Duration, Instant};

use crate::media::MediaUnit;

/// Statistics for one source connection
#[derive(Debug, Clone)]
pub struct IngestStats {
    /// When the connection was established
    pub started_at: Instant,
    /// Units received from the source
    pub units: u64,
    /// Keyframes received
    pub keyframes: u64,
    /// Payload bytes received
    pub bytes_received: u64,
    /// Codec updates signaled by the source
    pub codec_updates: u64,
    /// Timestamp of the last unit
    pub last_timestamp: Duration,
}

impl IngestStats {
    /// Start statistics for a connection established now
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            units: 0,
            keyframes: 0,
            bytes_received: 0,
            codec_updates: 0,
            last_timestamp: Duration::ZERO,
        }
    }

    /// Account for one received unit
    pub fn record(&mut self, unit: &MediaUnit) {
        self.units += 1;
        self.bytes_received += unit.size() as u64;
        self.last_timestamp = unit.timestamp;
        if unit.is_keyframe {
            self.keyframes += 1;
        }
    }

    /// Get duration since the connection started
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Calculate bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration().as_secs();
        if secs > 0 {
            (self.bytes_received * 8) / secs
        } else {
            0
        }
    }
}

impl Default for IngestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Registered streams
    pub streams: usize,
    /// On-demand streams among them
    pub on_demand_streams: usize,
    /// Streams with a running ingestion worker
    pub running_workers: usize,
    /// Attached viewers across all streams
    pub viewers: usize,
    /// Units fanned out across all streams
    pub units_broadcast: u64,
    /// Per-viewer drops across all streams
    pub units_dropped: u64,
}
