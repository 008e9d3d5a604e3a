//! Simulated camera relay
//!
//! Run with: cargo run --example simulated_camera [-- --config path/to/config.json]
//!
//! Drives the stream manager with a synthetic H.264 source (one keyframe per
//! second, 25 units per second) and a viewer negotiator that only counts what
//! it is sent. Without a configuration file, a single on-demand stream named
//! `demo` is registered and one viewer is opened on it.
//!
//! Logging is controlled with `RUST_LOG`, e.g. `RUST_LOG=camrelay=debug`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use clap::Parser;

use camrelay::media::{Codec, CodecKind, MediaUnit};
use camrelay::source::{DialOptions, SourceClient, SourceConnection, SourceError};
use camrelay::viewer::{SessionError, SessionNegotiator, SessionOptions, ViewerSession};
use camrelay::{AppConfig, Args, MemoryStore, StreamDescriptor, StreamManager, StreamRegistry};

const FRAME_INTERVAL: Duration = Duration::from_millis(40);
const GOP_LENGTH: u64 = 25;

/// Source client producing a synthetic H.264 feed for any `sim://` address
struct SyntheticSource;

#[async_trait]
impl SourceClient for SyntheticSource {
    async fn dial(&self, url: &str, _options: &DialOptions) -> Result<SourceConnection, SourceError> {
        if !url.starts_with("sim://") {
            return Err(SourceError::Unreachable(url.to_string()));
        }

        let (connection, mut feed) = SourceConnection::channel(Some(vec![Codec::new(CodecKind::H264)]));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(FRAME_INTERVAL);
            let mut frame: u64 = 0;
            loop {
                tokio::select! {
                    _ = &mut feed.closed => break,
                    _ = interval.tick() => {
                        let timestamp = FRAME_INTERVAL * frame as u32;
                        let unit = if frame % GOP_LENGTH == 0 {
                            MediaUnit::keyframe(timestamp, Bytes::from_static(&[0x65, 0x88, 0x84]))
                        } else {
                            MediaUnit::delta(timestamp, Bytes::from_static(&[0x41, 0x9a]))
                        };
                        if feed.units.send(unit).await.is_err() {
                            break;
                        }
                        frame += 1;
                    }
                }
            }
        });

        Ok(connection)
    }
}

/// Negotiator whose sessions count delivered units
#[derive(Default)]
struct CountingNegotiator {
    delivered: Arc<AtomicU64>,
}

struct CountingSession {
    delivered: Arc<AtomicU64>,
}

impl SessionNegotiator for CountingNegotiator {
    fn create_session(&self, options: &SessionOptions) -> Box<dyn ViewerSession> {
        tracing::debug!(ice_servers = ?options.ice_servers, "Creating viewer session");
        Box::new(CountingSession {
            delivered: Arc::clone(&self.delivered),
        })
    }
}

#[async_trait]
impl ViewerSession for CountingSession {
    async fn negotiate(&mut self, codecs: &[Codec], offer: &str) -> Result<String, SessionError> {
        if offer.is_empty() {
            return Err(SessionError::Negotiation("empty offer".into()));
        }
        Ok(format!("answer for {} track(s)", codecs.len()))
    }

    async fn write_unit(&mut self, _unit: &MediaUnit) -> Result<(), SessionError> {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn close(&mut self) {}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("camrelay=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = AppConfig::resolve(&args).await?;

    let mut seed = config.descriptors();
    if seed.is_empty() {
        seed.push(StreamDescriptor::new("demo", "sim://camera/1").on_demand(true));
    }
    let first = seed[0].id.clone();

    let negotiator = Arc::new(CountingNegotiator::default());
    let delivered = Arc::clone(&negotiator.delivered);
    let manager = StreamManager::new(
        Arc::new(StreamRegistry::new()),
        Arc::new(SyntheticSource),
        negotiator,
        Arc::new(MemoryStore::new()),
    )
    .with_session_options(config.server.session_options());

    let started = manager.start(seed).await?;
    println!("Started {} always-on stream(s)", started);

    let answer = manager.open_viewer(&first, "v=0 demo-offer").await?;
    println!(
        "Viewer {} on {}: tracks={:?} answer={:?}",
        answer.viewer_id, answer.stream_id, answer.tracks, answer.answer
    );

    let mut report = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = report.tick() => {
                let summary = manager.registry().summary().await;
                println!(
                    "Stats: streams={} running={} viewers={} broadcast={} dropped={} delivered={}",
                    summary.streams,
                    summary.running_workers,
                    summary.viewers,
                    summary.units_broadcast,
                    summary.units_dropped,
                    delivered.load(Ordering::Relaxed),
                );
            }
        }
    }

    manager.shutdown().await;
    Ok(())
}
