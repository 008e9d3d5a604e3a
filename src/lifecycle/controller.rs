//! Stream manager
//!
//! Decides when ingestion runs. Always-on streams get a supervisor that
//! restarts the worker after a fixed backoff for as long as the stream is
//! registered. On-demand streams get a worker when a viewer attaches, and go
//! dormant once it exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::error::Result;
use crate::media::{is_audio_only, webrtc_tracks, MediaUnit, TrackKind};
use crate::registry::{RegistryError, StreamDescriptor, StreamRegistry, WorkerLease};
use crate::source::{ExitReason, IngestWorker, SourceClient, WorkerState};
use crate::store::{DescriptorStore, StoreError};
use crate::viewer::{SessionNegotiator, SessionOptions, ViewerConnection};

use super::config::LifecycleConfig;

/// Interval between checks while waiting for workers to wind down
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of a successful viewer request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerAnswer {
    /// Stream the viewer is attached to
    pub stream_id: String,
    /// ID of the attached viewer
    pub viewer_id: String,
    /// Tracks the session carries
    pub tracks: Vec<TrackKind>,
    /// Session answer for the viewer's offer
    pub answer: String,
}

/// Lifecycle controller for every stream in a registry
pub struct StreamManager {
    registry: Arc<StreamRegistry>,
    source: Arc<dyn SourceClient>,
    negotiator: Arc<dyn SessionNegotiator>,
    store: Arc<dyn DescriptorStore>,
    config: LifecycleConfig,
    session_options: SessionOptions,
    closing: AtomicBool,
}

impl StreamManager {
    /// Create a manager over a registry and its collaborators
    pub fn new(
        registry: Arc<StreamRegistry>,
        source: Arc<dyn SourceClient>,
        negotiator: Arc<dyn SessionNegotiator>,
        store: Arc<dyn DescriptorStore>,
    ) -> Self {
        Self {
            registry,
            source,
            negotiator,
            store,
            config: LifecycleConfig::default(),
            session_options: SessionOptions::default(),
            closing: AtomicBool::new(false),
        }
    }

    /// Set the timing policy
    pub fn with_lifecycle(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the options used for every viewer session
    pub fn with_session_options(mut self, options: SessionOptions) -> Self {
        self.session_options = options;
        self
    }

    /// Get a reference to the stream registry
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Timing policy in use
    pub fn lifecycle(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Seed the registry and start every always-on stream
    ///
    /// `seed` descriptors (from the config file) take precedence over the
    /// store's always-on descriptors with the same ID. Returns the number of
    /// workers started.
    pub async fn start(&self, seed: Vec<StreamDescriptor>) -> Result<usize> {
        for descriptor in seed {
            self.registry.add_or_replace(descriptor).await;
        }
        for descriptor in self.store.list_always_on().await? {
            self.registry.add_if_absent(descriptor).await;
        }

        let mut started = 0;
        for id in self.registry.stream_ids().await {
            let always_on = self
                .registry
                .descriptor(&id)
                .await
                .is_some_and(|d| !d.on_demand);
            if always_on && self.ensure_running(&id).await {
                started += 1;
            }
        }

        tracing::info!(
            streams = self.registry.stream_count().await,
            started = started,
            "Stream manager started"
        );

        Ok(started)
    }

    /// Start the stream's worker unless one is already running
    ///
    /// Returns whether this call started it.
    pub async fn ensure_running(&self, id: &str) -> bool {
        if self.closing.load(Ordering::SeqCst) {
            return false;
        }
        let Some((lease, descriptor)) = self.registry.claim_worker(id).await else {
            return false;
        };

        let on_demand = descriptor.on_demand;
        let worker = IngestWorker::new(
            descriptor,
            Arc::clone(&self.registry),
            Arc::clone(&self.source),
            self.config.clone(),
        );
        let registry = Arc::clone(&self.registry);
        let backoff = self.config.restart_backoff;

        tracing::info!(stream = %id, on_demand = on_demand, "Stream worker started");
        tokio::spawn(supervise(worker, lease, registry, backoff, on_demand));

        true
    }

    /// Attach a viewer queue to a stream
    ///
    /// Starts the worker of an on-demand stream.
    pub async fn attach_viewer(&self, id: &str) -> (String, mpsc::Receiver<MediaUnit>) {
        let attached = self.registry.attach_viewer(id).await;

        if self
            .registry
            .descriptor(id)
            .await
            .is_some_and(|d| d.on_demand)
        {
            self.ensure_running(id).await;
        }

        attached
    }

    /// Detach a viewer queue; no-op if absent
    pub async fn detach_viewer(&self, id: &str, viewer_id: &str) -> bool {
        self.registry.detach_viewer(id, viewer_id).await
    }

    /// Tracks a browser session can carry for a stream
    ///
    /// Starts an on-demand worker and waits for codec discovery.
    pub async fn tracks(&self, id: &str) -> Result<Vec<TrackKind>> {
        let descriptor = self.require(id).await?;
        if descriptor.on_demand {
            self.ensure_running(id).await;
        }

        let codecs = self.registry.get_codecs_blocking(id).await?;
        Ok(webrtc_tracks(&codecs))
    }

    /// Serve a viewer's offer for a registered stream
    pub async fn open_viewer(&self, id: &str, offer: &str) -> Result<ViewerAnswer> {
        let descriptor = self.require(id).await?;
        if descriptor.on_demand {
            self.ensure_running(id).await;
        }

        let codecs = self.registry.get_codecs_blocking(id).await.map_err(|e| {
            tracing::warn!(stream = %id, error = %e, "Viewer request failed");
            e
        })?;

        let mut session = self.negotiator.create_session(&self.session_options);
        let answer = match session.negotiate(&codecs, offer).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(stream = %id, error = %e, "Viewer negotiation failed");
                session.close().await;
                return Err(e.into());
            }
        };

        // Restarts the worker if it went idle while the session negotiated
        let (viewer_id, queue) = self.attach_viewer(id).await;
        let connection = ViewerConnection::new(
            id.to_string(),
            viewer_id.clone(),
            queue,
            session,
            Arc::clone(&self.registry),
        )
        .audio_only(is_audio_only(&codecs))
        .idle_timeout(self.config.viewer_idle_timeout);
        tokio::spawn(connection.run());

        Ok(ViewerAnswer {
            stream_id: id.to_string(),
            viewer_id,
            tracks: webrtc_tracks(&codecs),
            answer,
        })
    }

    /// Serve a viewer's offer for a source address
    ///
    /// Unknown addresses are registered as on-demand streams.
    pub async fn open_viewer_by_url(&self, url: &str, offer: &str) -> Result<ViewerAnswer> {
        let descriptor = self.resolve_url(url).await?;
        self.open_viewer(&descriptor.id, offer).await
    }

    /// Find or create the stream for a source address
    ///
    /// Looks in the registry, then the store. Otherwise registers a new
    /// on-demand descriptor; concurrent callers for one address share it.
    pub async fn resolve_url(&self, url: &str) -> Result<StreamDescriptor> {
        if let Some(descriptor) = self.registry.find_by_url(url).await {
            return Ok(descriptor);
        }

        if let Some(stored) = self.store.find_by_url(url).await? {
            self.registry.add_if_absent(stored.clone()).await;
            return Ok(self.registry.descriptor(&stored.id).await.unwrap_or(stored));
        }

        let (descriptor, created) = self.registry.register_url(url).await;
        if created {
            if let Err(e) = self.store.create(&descriptor).await {
                tracing::warn!(stream = %descriptor.id, error = %e, "Failed to persist stream");
            }
        }
        Ok(descriptor)
    }

    /// Create a stream
    ///
    /// An empty ID is replaced by a generated one. Always-on streams start
    /// immediately.
    pub async fn create_stream(&self, mut descriptor: StreamDescriptor) -> Result<StreamDescriptor> {
        if descriptor.id.is_empty() {
            descriptor.id = uuid::Uuid::new_v4().to_string();
        }

        self.store.create(&descriptor).await?;
        self.install(descriptor.clone()).await;

        Ok(descriptor)
    }

    /// Replace a stream's descriptor
    ///
    /// Viewers of the old definition are dropped and its worker stopped.
    pub async fn update_stream(&self, descriptor: StreamDescriptor) -> Result<()> {
        self.store.update(&descriptor).await?;
        self.install(descriptor).await;
        Ok(())
    }

    /// Delete a stream, stopping its worker
    pub async fn delete_stream(&self, id: &str) -> Result<()> {
        // Config-seeded streams live only in the registry
        let persisted = match self.store.delete(id).await {
            Ok(()) => true,
            Err(StoreError::NotFound(_)) => false,
            Err(e) => return Err(e.into()),
        };
        let registered = self.registry.remove(id).await.is_some();

        if persisted || registered {
            Ok(())
        } else {
            Err(RegistryError::StreamNotFound(id.to_string()).into())
        }
    }

    /// All persisted streams
    pub async fn list_streams(&self) -> Result<Vec<StreamDescriptor>> {
        Ok(self.store.list().await?)
    }

    /// One stream, from the registry or the store
    pub async fn get_stream(&self, id: &str) -> Result<StreamDescriptor> {
        if let Some(descriptor) = self.registry.descriptor(id).await {
            return Ok(descriptor);
        }
        self.store
            .get(id)
            .await?
            .ok_or_else(|| RegistryError::StreamNotFound(id.to_string()).into())
    }

    /// Stop a stream's worker without restarting it
    ///
    /// Returns whether a running worker was signaled. A later viewer (for
    /// on-demand streams) or update starts it again.
    pub async fn stop_stream(&self, id: &str) -> Result<bool> {
        if !self.registry.exists(id).await {
            return Err(RegistryError::StreamNotFound(id.to_string()).into());
        }
        Ok(self.registry.stop_worker(id).await)
    }

    /// Stop every worker and wait for them to release their streams
    ///
    /// No worker starts after this is called.
    pub async fn shutdown(&self) {
        self.closing.store(true, Ordering::SeqCst);

        let ids = self.registry.stream_ids().await;
        for id in &ids {
            self.registry.stop_worker(id).await;
        }

        while self.registry.summary().await.running_workers > 0 {
            sleep(SHUTDOWN_POLL_INTERVAL).await;
        }

        tracing::info!(streams = ids.len(), "Stream manager shut down");
    }

    async fn require(&self, id: &str) -> Result<StreamDescriptor> {
        self.registry
            .descriptor(id)
            .await
            .ok_or_else(|| RegistryError::StreamNotFound(id.to_string()).into())
    }

    async fn install(&self, descriptor: StreamDescriptor) {
        let id = descriptor.id.clone();
        let always_on = !descriptor.on_demand;

        self.registry.add_or_replace(descriptor).await;
        if always_on {
            self.ensure_running(&id).await;
        }
    }
}

/// Run a worker until it ends, restarting always-on streams
async fn supervise(
    worker: IngestWorker,
    mut lease: WorkerLease,
    registry: Arc<StreamRegistry>,
    backoff: Duration,
    on_demand: bool,
) {
    let id = worker.stream_id().to_string();

    loop {
        match worker.run(&mut lease).await {
            Ok(()) => break,
            Err(reason) => {
                match &reason {
                    ExitReason::NoViewer => {
                        tracing::info!(stream = %id, "Stream worker idle, no viewers")
                    }
                    _ => tracing::warn!(stream = %id, error = %reason, "Stream worker exited"),
                }
                if !lease.is_stopped() {
                    registry.set_last_error(&id, reason).await;
                }
            }
        }

        if on_demand || lease.is_stopped() {
            break;
        }

        registry.set_worker_state(&lease, WorkerState::Exited).await;
        tokio::select! {
            _ = lease.stopped() => break,
            _ = sleep(backoff) => {}
        }
        tracing::debug!(stream = %id, "Stream worker restarting");
    }

    tracing::info!(stream = %id, "Stream worker exit");
    registry.release_worker(lease).await;
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::error::Error;
    use crate::media::{Codec, CodecKind};
    use crate::source::SourceFeed;
    use crate::store::MemoryStore;
    use crate::testing::{MockNegotiator, MockSource};

    struct Harness {
        manager: Arc<StreamManager>,
        source: Arc<MockSource>,
        feeds: mpsc::UnboundedReceiver<SourceFeed>,
        negotiator: Arc<MockNegotiator>,
        store: Arc<MemoryStore>,
    }

    fn harness(codecs: Option<Vec<Codec>>, stored: Vec<StreamDescriptor>) -> Harness {
        let (source, feeds) = MockSource::new(codecs);
        let negotiator = MockNegotiator::new();
        let store = Arc::new(MemoryStore::with_descriptors(stored));
        let manager = StreamManager::new(
            Arc::new(StreamRegistry::new()),
            source.clone(),
            negotiator.clone(),
            store.clone(),
        );
        Harness {
            manager: Arc::new(manager),
            source,
            feeds,
            negotiator,
            store,
        }
    }

    fn h264() -> Vec<Codec> {
        vec![Codec::new(CodecKind::H264)]
    }

    async fn wait_for_state(registry: &StreamRegistry, id: &str, state: WorkerState) {
        loop {
            if registry.stats(id).await.and_then(|s| s.worker_state) == Some(state) {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_demand_viewer_scenario() {
        let mut h = harness(Some(h264()), vec![]);
        let registry = Arc::clone(h.manager.registry());
        h.manager
            .create_stream(StreamDescriptor::new("cam-1", "rtsp://example/cam1").on_demand(true))
            .await
            .unwrap();
        assert!(!registry.is_running("cam-1").await);

        let (v1, mut rx) = h.manager.attach_viewer("cam-1").await;
        let feed = h.feeds.recv().await.unwrap();

        assert_eq!(registry.get_codecs_blocking("cam-1").await, Ok(h264()));

        let units = [
            MediaUnit::keyframe(Duration::ZERO, Bytes::from_static(&[0x65])),
            MediaUnit::delta(Duration::from_millis(40), Bytes::from_static(&[0x41])),
            MediaUnit::delta(Duration::from_millis(80), Bytes::from_static(&[0x41])),
        ];
        for unit in units.iter().cloned() {
            feed.units.send(unit).await.unwrap();
        }
        for expected in &units {
            assert_eq!(rx.recv().await.as_ref(), Some(expected));
        }

        assert!(h.manager.detach_viewer("cam-1", &v1).await);

        // Keep the source producing keyframes so only the viewer check can end it
        let pump = tokio::spawn(async move {
            let mut ts = 120;
            loop {
                let unit = MediaUnit::keyframe(Duration::from_millis(ts), Bytes::from_static(&[0x65]));
                if feed.units.send(unit).await.is_err() {
                    break;
                }
                ts += 500;
                sleep(Duration::from_millis(500)).await;
            }
        });

        wait_for_state(&registry, "cam-1", WorkerState::Exited).await;
        pump.await.unwrap();

        assert_eq!(
            registry.get_last_error("cam-1").await,
            Some(ExitReason::NoViewer)
        );
        assert!(!registry.is_running("cam-1").await);
        assert!(registry.get_codecs("cam-1").await.is_none());

        // Dormant until the next viewer
        sleep(Duration::from_secs(60)).await;
        assert_eq!(h.source.dials(), 1);

        let (_v2, _rx2) = h.manager.attach_viewer("cam-1").await;
        assert!(h.feeds.recv().await.is_some());
        assert_eq!(h.source.dials(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_racing_idle_check_is_not_lost() {
        let mut h = harness(Some(h264()), vec![]);
        let registry = Arc::clone(h.manager.registry());
        h.manager
            .create_stream(StreamDescriptor::new("cam-1", "rtsp://example/cam1").on_demand(true))
            .await
            .unwrap();

        // A worker holds the stream and is about to run its idle check
        let (lease, _) = registry.claim_worker("cam-1").await.unwrap();

        let (v1, _rx1) = h.manager.attach_viewer("cam-1").await;
        assert_eq!(h.source.dials(), 0);
        // The idle check sees the new viewer and keeps streaming
        assert!(!registry.release_if_idle(&lease).await);
        assert!(registry.is_running("cam-1").await);

        h.manager.detach_viewer("cam-1", &v1).await;
        assert!(registry.release_if_idle(&lease).await);

        // A viewer arriving after the release starts a fresh worker
        let (_v2, _rx2) = h.manager.attach_viewer("cam-1").await;
        assert!(h.feeds.recv().await.is_some());
        assert_eq!(h.source.dials(), 1);
        assert!(registry.is_running("cam-1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_attach_starts_one_worker() {
        let h = harness(Some(h264()), vec![]);
        h.manager
            .create_stream(StreamDescriptor::new("cam-1", "rtsp://example/cam1").on_demand(true))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let manager = Arc::clone(&h.manager);
            handles.push(tokio::spawn(async move {
                manager.attach_viewer("cam-1").await
            }));
        }
        let mut receivers = Vec::new();
        for handle in handles {
            receivers.push(handle.await.unwrap());
        }
        sleep(Duration::from_millis(100)).await;

        assert_eq!(h.source.dials(), 1);
        assert_eq!(h.manager.registry().viewer_count("cam-1").await, 32);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_on_retries_until_reachable() {
        let h = harness(
            Some(h264()),
            vec![StreamDescriptor::new("cam-1", "rtsp://example/cam1")],
        );
        h.source.set_reachable(false);
        let registry = Arc::clone(h.manager.registry());

        assert_eq!(h.manager.start(vec![]).await.unwrap(), 1);

        sleep(Duration::from_millis(3500)).await;
        assert!(h.source.dials() >= 3);
        assert!(matches!(
            registry.get_last_error("cam-1").await,
            Some(ExitReason::DialFailure(_))
        ));
        assert!(registry.is_running("cam-1").await);

        h.source.set_reachable(true);
        wait_for_state(&registry, "cam-1", WorkerState::Streaming).await;
        assert_eq!(registry.get_codecs("cam-1").await, Some(h264()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_on_restarts_after_disconnect() {
        let mut h = harness(Some(h264()), vec![]);
        let registry = Arc::clone(h.manager.registry());
        h.manager
            .start(vec![StreamDescriptor::new("cam-1", "rtsp://example/cam1")])
            .await
            .unwrap();

        let feed = h.feeds.recv().await.unwrap();
        let started = Instant::now();
        feed.signals
            .send(crate::source::SourceSignal::Disconnected)
            .await
            .unwrap();

        assert!(h.feeds.recv().await.is_some());
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(
            registry.get_last_error("cam-1").await,
            Some(ExitReason::Disconnected)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_stream_does_not_restart() {
        let mut h = harness(Some(h264()), vec![]);
        let registry = Arc::clone(h.manager.registry());
        h.manager
            .start(vec![StreamDescriptor::new("cam-1", "rtsp://example/cam1")])
            .await
            .unwrap();
        let _feed = h.feeds.recv().await.unwrap();

        assert!(h.manager.stop_stream("cam-1").await.unwrap());
        sleep(Duration::from_secs(10)).await;

        assert!(!registry.is_running("cam-1").await);
        assert!(registry.get_last_error("cam-1").await.is_none());
        assert_eq!(h.source.dials(), 1);
        assert!(matches!(
            h.manager.stop_stream("missing").await,
            Err(Error::Registry(RegistryError::StreamNotFound(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_viewer() {
        let mut h = harness(Some(h264()), vec![]);
        h.manager
            .create_stream(StreamDescriptor::new("cam-1", "rtsp://example/cam1").on_demand(true))
            .await
            .unwrap();

        let answer = h.manager.open_viewer("cam-1", "offer").await.unwrap();
        let feed = h.feeds.recv().await.unwrap();

        assert_eq!(answer.stream_id, "cam-1");
        assert_eq!(answer.tracks, vec![TrackKind::Video]);
        assert_eq!(answer.answer, "answer:1:offer");
        assert!(h.manager.registry().has_viewers("cam-1").await);

        feed.units
            .send(MediaUnit::keyframe(Duration::ZERO, Bytes::from_static(&[0x65])))
            .await
            .unwrap();
        sleep(Duration::from_millis(10)).await;

        let session = &h.negotiator.sessions()[0];
        assert_eq!(session.written.lock().unwrap().len(), 1);

        // The viewer session closes itself once the source goes quiet
        sleep(Duration::from_secs(11)).await;
        assert!(session.closed.load(Ordering::SeqCst));
        assert!(!h.manager.registry().has_viewers("cam-1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_viewer_errors() {
        let h = harness(None, vec![]);
        h.manager
            .create_stream(StreamDescriptor::new("cam-1", "rtsp://example/cam1").on_demand(true))
            .await
            .unwrap();

        assert!(matches!(
            h.manager.open_viewer("missing", "offer").await,
            Err(Error::Registry(RegistryError::StreamNotFound(_)))
        ));

        // The source connects but never reports codecs
        let started = Instant::now();
        assert!(matches!(
            h.manager.open_viewer("cam-1", "offer").await,
            Err(Error::Registry(RegistryError::CodecTimeout(_)))
        ));
        assert!(started.elapsed() < Duration::from_secs(6));
        assert!(h.negotiator.sessions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_negotiation_failure_attaches_nothing() {
        let h = harness(Some(h264()), vec![]);
        h.negotiator.fail_negotiation();
        h.manager
            .create_stream(StreamDescriptor::new("cam-1", "rtsp://example/cam1"))
            .await
            .unwrap();

        let result = h.manager.open_viewer("cam-1", "offer").await;

        assert!(matches!(result, Err(Error::Session(_))));
        assert!(!h.manager.registry().has_viewers("cam-1").await);
        assert!(h.negotiator.sessions()[0].closed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_viewer_by_url_registers_once() {
        let h = harness(Some(h264()), vec![]);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&h.manager);
            handles.push(tokio::spawn(async move {
                manager.open_viewer_by_url("rtsp://example/cam9", "offer").await
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().stream_id);
        }
        ids.dedup();

        assert_eq!(ids.len(), 1);
        assert_eq!(h.source.dials(), 1);
        let stored = h.store.list().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].on_demand);
        assert_eq!(stored[0].id, ids[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_url_prefers_store() {
        let h = harness(
            Some(h264()),
            vec![StreamDescriptor::new("lobby", "rtsp://example/lobby").on_demand(true)],
        );

        let descriptor = h.manager.resolve_url("rtsp://example/lobby").await.unwrap();

        assert_eq!(descriptor.id, "lobby");
        assert!(h.manager.registry().exists("lobby").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracks_skip_unsupported_codecs() {
        let h = harness(
            Some(vec![Codec::new(CodecKind::H265), Codec::new(CodecKind::PcmAlaw)]),
            vec![],
        );
        h.manager
            .create_stream(StreamDescriptor::new("cam-1", "rtsp://example/cam1").on_demand(true))
            .await
            .unwrap();

        assert_eq!(h.manager.tracks("cam-1").await.unwrap(), vec![TrackKind::Audio]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crud_keeps_registry_in_sync() {
        let mut h = harness(Some(h264()), vec![]);
        let registry = Arc::clone(h.manager.registry());

        let created = h
            .manager
            .create_stream(StreamDescriptor::new("", "rtsp://example/cam1"))
            .await
            .unwrap();
        assert!(!created.id.is_empty());
        let first = h.feeds.recv().await.unwrap();

        assert_err!(h.manager.create_stream(created.clone()).await);

        let updated = created.clone().on_demand(true);
        assert_ok!(h.manager.update_stream(updated.clone()).await);
        // The old connection was released and nothing restarted it
        assert!(first.closed.await.is_ok());
        assert_eq!(h.manager.get_stream(&created.id).await.unwrap(), updated);
        assert_eq!(h.manager.list_streams().await.unwrap(), vec![updated]);

        assert_ok!(h.manager.delete_stream(&created.id).await);
        assert_err!(h.manager.delete_stream(&created.id).await);
        assert!(!registry.exists(&created.id).await);
        assert!(matches!(
            h.manager.get_stream(&created.id).await,
            Err(Error::Registry(RegistryError::StreamNotFound(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_everything() {
        let mut h = harness(Some(h264()), vec![]);
        let registry = Arc::clone(h.manager.registry());
        h.manager
            .start(vec![
                StreamDescriptor::new("cam-1", "rtsp://example/cam1"),
                StreamDescriptor::new("cam-2", "rtsp://example/cam2"),
            ])
            .await
            .unwrap();
        h.feeds.recv().await.unwrap();
        h.feeds.recv().await.unwrap();

        h.manager.shutdown().await;

        assert_eq!(registry.summary().await.running_workers, 0);
        assert!(!h.manager.ensure_running("cam-1").await);
    }
}
