//! Ingestion worker
//!
//! A worker owns one source connection at a time and moves through
//! `Connecting -> Streaming -> Exited`. While streaming it waits on four
//! inputs at once:
//!
//! - the operator stop signal carried by its [`WorkerLease`]
//! - the viewer check timer (on-demand streams only)
//! - the no-keyframe watchdog
//! - the source's signal and media channels
//!
//! Every media unit is handed to [`StreamRegistry::broadcast_leased`], which
//! never blocks on viewers. Writes made under a stale lease are discarded.

use std::sync::Arc;

use tokio::time::{sleep, Instant};

use crate::lifecycle::LifecycleConfig;
use crate::media::is_audio_only;
use crate::registry::{StreamDescriptor, StreamRegistry, WorkerLease};
use crate::stats::IngestStats;

use super::error::{ExitReason, SourceError};
use super::{DialOptions, SourceClient, SourceConnection, SourceSignal};

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Dialing the source
    Connecting,
    /// Connected and forwarding media
    Streaming,
    /// Connection released
    Exited,
}

/// Runs connection attempts for one stream
pub struct IngestWorker {
    descriptor: StreamDescriptor,
    registry: Arc<StreamRegistry>,
    source: Arc<dyn SourceClient>,
    config: LifecycleConfig,
}

impl IngestWorker {
    /// Create a worker for a stream
    pub fn new(
        descriptor: StreamDescriptor,
        registry: Arc<StreamRegistry>,
        source: Arc<dyn SourceClient>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            descriptor,
            registry,
            source,
            config,
        }
    }

    /// Stream this worker ingests
    pub fn stream_id(&self) -> &str {
        &self.descriptor.id
    }

    fn dial_options(&self) -> DialOptions {
        DialOptions {
            disable_audio: self.descriptor.disable_audio,
            dial_timeout: self.config.dial_timeout,
            read_write_timeout: self.config.read_write_timeout,
            debug: self.descriptor.debug,
        }
    }

    /// Run one connection attempt until it ends
    ///
    /// Returns `Ok(())` when the operator stopped the worker (or the stream
    /// was replaced or removed), and the exit reason otherwise.
    pub async fn run(&self, lease: &mut WorkerLease) -> Result<(), ExitReason> {
        let id = self.stream_id();

        self.registry
            .set_worker_state(lease, WorkerState::Connecting)
            .await;
        tracing::info!(stream = %id, url = %self.descriptor.url, "Stream try connect");

        let options = self.dial_options();
        let budget = self.config.dial_budget();

        let mut connection = tokio::select! {
            _ = lease.stopped() => return Ok(()),
            dialed = tokio::time::timeout(budget, self.source.dial(&self.descriptor.url, &options)) => {
                match dialed {
                    Ok(Ok(connection)) => connection,
                    Ok(Err(e)) => return Err(e.into()),
                    Err(_) => return Err(SourceError::Timeout(budget).into()),
                }
            }
        };

        let mut stats = IngestStats::new();
        let result = self.stream(&mut connection, lease, &mut stats).await;
        connection.close();

        tracing::info!(
            stream = %id,
            units = stats.units,
            keyframes = stats.keyframes,
            bytes = stats.bytes_received,
            bitrate = stats.bitrate(),
            duration_secs = stats.duration().as_secs(),
            "Stream connection closed"
        );

        result
    }

    async fn stream(
        &self,
        connection: &mut SourceConnection,
        lease: &mut WorkerLease,
        stats: &mut IngestStats,
    ) -> Result<(), ExitReason> {
        let id = self.stream_id();
        let on_demand = self.descriptor.on_demand;

        let mut audio_only = false;
        if let Some(codecs) = connection.codecs.take() {
            audio_only = is_audio_only(&codecs);
            self.registry.publish_codecs(lease, codecs).await;
        }

        self.registry
            .set_worker_state(lease, WorkerState::Streaming)
            .await;
        tracing::info!(stream = %id, audio_only = audio_only, "Stream connected");

        let viewer_check = sleep(self.config.viewer_check_interval);
        let no_video = sleep(self.config.no_video_timeout);
        tokio::pin!(viewer_check, no_video);
        let mut signals_open = true;

        loop {
            tokio::select! {
                biased;

                _ = lease.stopped() => {
                    tracing::info!(stream = %id, "Stream worker stopped");
                    return Ok(());
                }
                _ = &mut viewer_check, if on_demand => {
                    if self.registry.release_if_idle(lease).await {
                        return Err(ExitReason::NoViewer);
                    }
                    viewer_check
                        .as_mut()
                        .reset(Instant::now() + self.config.viewer_check_interval);
                }
                _ = &mut no_video => {
                    return Err(ExitReason::NoVideo);
                }
                signal = connection.signals.recv(), if signals_open => match signal {
                    Some(SourceSignal::CodecUpdate(codecs)) => {
                        stats.codec_updates += 1;
                        audio_only = is_audio_only(&codecs);
                        tracing::debug!(stream = %id, tracks = codecs.len(), "Codec update");
                        self.registry.publish_codecs(lease, codecs).await;
                    }
                    Some(SourceSignal::Disconnected) => {
                        return Err(ExitReason::Disconnected);
                    }
                    None => signals_open = false,
                },
                unit = connection.units.recv() => {
                    let Some(unit) = unit else {
                        return Err(ExitReason::Disconnected);
                    };
                    if audio_only || unit.is_keyframe {
                        no_video
                            .as_mut()
                            .reset(Instant::now() + self.config.no_video_timeout);
                    }
                    stats.record(&unit);
                    self.registry.broadcast_leased(lease, unit).await;
                }
            }
        }
    }
}
