//! Stream registry implementation
//!
//! The central registry that tracks every stream, its viewers, and whether an
//! ingestion worker owns it, and that fans out media units from workers to
//! viewer queues.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, watch, RwLock};

use crate::media::{Codec, MediaUnit};
use crate::source::{ExitReason, WorkerState};
use crate::stats::RegistryStats;

use super::config::RegistryConfig;
use super::descriptor::StreamDescriptor;
use super::entry::{FanOut, StreamEntry, StreamStats};
use super::lease::WorkerLease;

/// Central registry for all streams
///
/// Thread-safe via a single `RwLock` guarding the whole table. Read-only
/// queries and broadcasting take the shared side; anything that changes the
/// stream or viewer maps takes the exclusive side.
pub struct StreamRegistry {
    /// Map of stream ID to stream entry
    streams: RwLock<HashMap<String, StreamEntry>>,

    /// Most recent ingestion failure across all streams
    latest_error: RwLock<Option<(String, ExitReason)>>,

    /// Next worker lease generation
    next_generation: AtomicU64,

    /// Configuration
    config: RegistryConfig,
}

impl StreamRegistry {
    /// Create a new stream registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new stream registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            latest_error: RwLock::new(None),
            next_generation: AtomicU64::new(1),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Check if a stream exists
    pub async fn exists(&self, id: &str) -> bool {
        self.streams.read().await.contains_key(id)
    }

    /// Insert or overwrite a stream
    ///
    /// The new entry starts with no viewers, no codecs and no worker. Viewer
    /// queues of a replaced entry are closed, and its worker (if any) sees its
    /// lease stop.
    pub async fn add_or_replace(&self, descriptor: StreamDescriptor) {
        let id = descriptor.id.clone();
        let mut streams = self.streams.write().await;

        let replaced = streams.insert(id.clone(), StreamEntry::new(Some(descriptor)));

        match replaced {
            Some(old) => tracing::info!(
                stream = %id,
                dropped_viewers = old.viewer_count(),
                "Stream replaced"
            ),
            None => tracing::info!(stream = %id, "Stream registered"),
        }
    }

    /// Insert a stream unless one with a descriptor is already registered
    ///
    /// A bare entry created by an early viewer keeps its viewers and gains
    /// the descriptor. Returns whether the descriptor was stored.
    pub async fn add_if_absent(&self, descriptor: StreamDescriptor) -> bool {
        let mut streams = self.streams.write().await;

        match streams.get_mut(&descriptor.id) {
            Some(entry) if entry.descriptor.is_some() => false,
            Some(entry) => {
                tracing::info!(stream = %descriptor.id, "Stream registered");
                entry.descriptor = Some(descriptor);
                true
            }
            None => {
                tracing::info!(stream = %descriptor.id, "Stream registered");
                streams.insert(descriptor.id.clone(), StreamEntry::new(Some(descriptor)));
                true
            }
        }
    }

    /// Remove a stream
    ///
    /// Returns the descriptor of the removed entry, if any.
    pub async fn remove(&self, id: &str) -> Option<StreamDescriptor> {
        let removed = self.streams.write().await.remove(id)?;

        tracing::info!(
            stream = %id,
            viewers = removed.viewer_count(),
            "Stream removed"
        );

        removed.descriptor
    }

    /// Get a copy of a stream's descriptor
    pub async fn descriptor(&self, id: &str) -> Option<StreamDescriptor> {
        self.streams
            .read()
            .await
            .get(id)
            .and_then(|entry| entry.descriptor.clone())
    }

    /// Find a registered stream by source address
    pub async fn find_by_url(&self, url: &str) -> Option<StreamDescriptor> {
        self.streams
            .read()
            .await
            .values()
            .filter_map(|entry| entry.descriptor.as_ref())
            .find(|d| d.url == url)
            .cloned()
    }

    /// Register an on-demand stream for an unknown address
    ///
    /// Concurrent calls for the same address resolve to a single descriptor.
    /// Returns the descriptor and whether this call created it.
    pub async fn register_url(&self, url: &str) -> (StreamDescriptor, bool) {
        let mut streams = self.streams.write().await;

        if let Some(existing) = streams
            .values()
            .filter_map(|entry| entry.descriptor.as_ref())
            .find(|d| d.url == url)
        {
            return (existing.clone(), false);
        }

        let descriptor = StreamDescriptor::generated(url);
        streams.insert(
            descriptor.id.clone(),
            StreamEntry::new(Some(descriptor.clone())),
        );

        tracing::info!(stream = %descriptor.id, url = %url, "On-demand stream auto-registered");

        (descriptor, true)
    }

    /// IDs of all registered streams
    pub async fn stream_ids(&self) -> Vec<String> {
        self.streams.read().await.keys().cloned().collect()
    }

    /// Get the codecs of a stream's current connection
    pub async fn get_codecs(&self, id: &str) -> Option<Vec<Codec>> {
        self.streams
            .read()
            .await
            .get(id)
            .and_then(|entry| entry.codecs.clone())
    }

    /// Publish codecs for a stream; no-op if the stream is absent
    pub async fn set_codecs(&self, id: &str, codecs: Vec<Codec>) {
        let mut streams = self.streams.write().await;

        if let Some(entry) = streams.get_mut(id) {
            tracing::debug!(stream = %id, tracks = codecs.len(), "Codecs published");
            entry.codecs = Some(codecs);
        }
    }

    /// Publish codecs on behalf of a worker
    ///
    /// Ignored if the lease is stale, so a replaced entry only ever sees the
    /// codecs of its own connection. Returns whether they were stored.
    pub async fn publish_codecs(&self, lease: &WorkerLease, codecs: Vec<Codec>) -> bool {
        let mut streams = self.streams.write().await;

        match Self::leased_entry(&mut streams, lease) {
            Some(entry) => {
                tracing::debug!(stream = %lease.stream_id, tracks = codecs.len(), "Codecs published");
                entry.codecs = Some(codecs);
                true
            }
            None => false,
        }
    }

    /// Attach a viewer to a stream
    ///
    /// Creates a bare entry if the stream is unknown. Returns the new viewer
    /// ID and the receiving end of its bounded delivery queue.
    pub async fn attach_viewer(&self, id: &str) -> (String, mpsc::Receiver<MediaUnit>) {
        let viewer_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(self.config.viewer_queue_capacity);

        let mut streams = self.streams.write().await;
        let entry = streams
            .entry(id.to_string())
            .or_insert_with(|| StreamEntry::new(None));
        entry.viewers.insert(viewer_id.clone(), tx);

        tracing::info!(
            stream = %id,
            viewer = %viewer_id,
            viewers = entry.viewer_count(),
            "Viewer attached"
        );

        (viewer_id, rx)
    }

    /// Detach a viewer; no-op if the stream or viewer is absent
    ///
    /// Returns whether a viewer was removed.
    pub async fn detach_viewer(&self, id: &str, viewer_id: &str) -> bool {
        let mut streams = self.streams.write().await;

        let Some(entry) = streams.get_mut(id) else {
            return false;
        };

        let removed = entry.viewers.remove(viewer_id).is_some();
        if removed {
            tracing::debug!(
                stream = %id,
                viewer = %viewer_id,
                viewers = entry.viewer_count(),
                "Viewer detached"
            );
        }
        removed
    }

    /// Check if a stream has any attached viewer
    pub async fn has_viewers(&self, id: &str) -> bool {
        self.viewer_count(id).await > 0
    }

    /// Number of viewers attached to a stream
    pub async fn viewer_count(&self, id: &str) -> usize {
        self.streams
            .read()
            .await
            .get(id)
            .map_or(0, StreamEntry::viewer_count)
    }

    /// Broadcast a unit to every viewer of a stream
    ///
    /// Never waits on a viewer: a full queue drops the unit for that viewer
    /// only. Queue sends are thread-safe, so the shared lock suffices.
    pub async fn broadcast(&self, id: &str, unit: MediaUnit) -> FanOut {
        let streams = self.streams.read().await;

        match streams.get(id) {
            Some(entry) => {
                let result = entry.fan_out(&unit);
                if result.dropped > 0 {
                    tracing::trace!(stream = %id, dropped = result.dropped, "Viewer queues full");
                }
                result
            }
            None => FanOut::default(),
        }
    }

    /// Broadcast a unit on behalf of a worker
    ///
    /// Delivers nothing if the lease is stale.
    pub async fn broadcast_leased(&self, lease: &WorkerLease, unit: MediaUnit) -> FanOut {
        let streams = self.streams.read().await;

        match streams
            .get(&lease.stream_id)
            .filter(|entry| Self::holds_lease(entry, lease))
        {
            Some(entry) => entry.fan_out(&unit),
            None => FanOut::default(),
        }
    }

    /// Record an ingestion failure for a stream; no-op if the stream is absent
    pub async fn set_last_error(&self, id: &str, error: ExitReason) {
        {
            let mut streams = self.streams.write().await;
            let Some(entry) = streams.get_mut(id) else {
                return;
            };
            entry.last_error = Some(error.clone());
        }
        *self.latest_error.write().await = Some((id.to_string(), error));
    }

    /// Most recent ingestion failure of a stream
    pub async fn get_last_error(&self, id: &str) -> Option<ExitReason> {
        self.streams
            .read()
            .await
            .get(id)
            .and_then(|entry| entry.last_error.clone())
    }

    /// Most recent ingestion failure of any stream, with its stream ID
    pub async fn latest_error(&self) -> Option<(String, ExitReason)> {
        self.latest_error.read().await.clone()
    }

    /// Claim the right to run a stream's ingestion worker
    ///
    /// Check-and-set under the exclusive lock: returns `None` if the stream
    /// is absent, has no descriptor, or a worker already runs.
    pub async fn claim_worker(&self, id: &str) -> Option<(WorkerLease, StreamDescriptor)> {
        let mut streams = self.streams.write().await;
        let entry = streams.get_mut(id)?;

        if entry.running {
            return None;
        }
        let descriptor = entry.descriptor.clone()?;

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (stop_tx, stop_rx) = watch::channel(false);

        entry.running = true;
        entry.worker_generation = generation;
        entry.worker_stop = Some(stop_tx);
        entry.worker_state = Some(WorkerState::Connecting);

        tracing::debug!(stream = %id, generation = generation, "Worker lease claimed");

        Some((WorkerLease::new(id.to_string(), generation, stop_rx), descriptor))
    }

    /// Report a worker state transition
    ///
    /// `Exited` also clears the codecs of the closed connection. Ignored if
    /// the lease is stale.
    pub async fn set_worker_state(&self, lease: &WorkerLease, state: WorkerState) {
        let mut streams = self.streams.write().await;

        if let Some(entry) = Self::leased_entry(&mut streams, lease) {
            entry.worker_state = Some(state);
            if state == WorkerState::Exited {
                entry.codecs = None;
            }
        }
    }

    /// Give back a worker lease
    ///
    /// Clears the running flag and the connection's codecs. Ignored if the
    /// entry was replaced or removed since the lease was claimed.
    pub async fn release_worker(&self, lease: WorkerLease) {
        let mut streams = self.streams.write().await;

        if let Some(entry) = Self::leased_entry(&mut streams, &lease) {
            Self::vacate(entry, &lease);
        }
    }

    /// Give back an on-demand worker's lease if the stream has no viewers
    ///
    /// The viewer check and the release happen under one exclusive lock, so
    /// a viewer attaching concurrently either keeps the worker streaming or
    /// finds the stream free to claim. Records `NoViewer` as the last error
    /// on release. Returns whether the worker should exit; a stale lease
    /// always should.
    pub async fn release_if_idle(&self, lease: &WorkerLease) -> bool {
        {
            let mut streams = self.streams.write().await;

            let Some(entry) = Self::leased_entry(&mut streams, lease) else {
                return true;
            };
            if entry.viewer_count() > 0 {
                return false;
            }
            Self::vacate(entry, lease);
            entry.last_error = Some(ExitReason::NoViewer);
        }

        *self.latest_error.write().await = Some((lease.stream_id.clone(), ExitReason::NoViewer));
        true
    }

    /// Ask a stream's worker to stop gracefully
    ///
    /// Returns whether a running worker was signaled.
    pub async fn stop_worker(&self, id: &str) -> bool {
        let streams = self.streams.read().await;

        match streams.get(id).and_then(|entry| entry.worker_stop.as_ref()) {
            Some(stop) => stop.send(true).is_ok(),
            None => false,
        }
    }

    /// Whether an ingestion worker currently owns a stream
    pub async fn is_running(&self, id: &str) -> bool {
        self.streams
            .read()
            .await
            .get(id)
            .is_some_and(|entry| entry.running)
    }

    /// Get stream statistics
    pub async fn stats(&self, id: &str) -> Option<StreamStats> {
        self.streams.read().await.get(id).map(StreamEntry::stats)
    }

    /// Get a process-wide summary
    pub async fn summary(&self) -> RegistryStats {
        let streams = self.streams.read().await;

        let mut summary = RegistryStats {
            streams: streams.len(),
            ..Default::default()
        };
        for entry in streams.values() {
            summary.viewers += entry.viewer_count();
            if entry.running {
                summary.running_workers += 1;
            }
            if entry.descriptor.as_ref().is_some_and(|d| d.on_demand) {
                summary.on_demand_streams += 1;
            }
            summary.units_broadcast += entry.units_broadcast.load(Ordering::Relaxed);
            summary.units_dropped += entry.units_dropped.load(Ordering::Relaxed);
        }
        summary
    }

    /// Get total number of streams
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }

    fn holds_lease(entry: &StreamEntry, lease: &WorkerLease) -> bool {
        entry.running && entry.worker_generation == lease.generation
    }

    fn leased_entry<'a>(
        streams: &'a mut HashMap<String, StreamEntry>,
        lease: &WorkerLease,
    ) -> Option<&'a mut StreamEntry> {
        streams
            .get_mut(&lease.stream_id)
            .filter(|entry| Self::holds_lease(entry, lease))
    }

    fn vacate(entry: &mut StreamEntry, lease: &WorkerLease) {
        entry.running = false;
        entry.worker_stop = None;
        entry.worker_state = Some(WorkerState::Exited);
        entry.codecs = None;

        tracing::debug!(
            stream = %lease.stream_id,
            generation = lease.generation,
            "Worker lease released"
        );
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}
