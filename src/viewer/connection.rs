//! Viewer connection loop
//!
//! Drains one viewer's delivery queue into its session. The loop notices a
//! dead source only through its own idle timer; nothing on the ingestion side
//! signals it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

use crate::media::MediaUnit;
use crate::registry::StreamRegistry;

use super::{SessionError, ViewerSession};

/// Why a viewer connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerExit {
    /// No keyframe (or audio unit) within the idle timeout
    IdleTimeout,
    /// The session rejected a write
    WriteFailed(SessionError),
    /// The delivery queue was closed (stream replaced or removed)
    QueueClosed,
}

/// One attached viewer and its session
pub struct ViewerConnection {
    stream_id: String,
    viewer_id: String,
    queue: mpsc::Receiver<MediaUnit>,
    session: Box<dyn ViewerSession>,
    registry: Arc<StreamRegistry>,
    audio_only: bool,
    idle_timeout: Duration,
}

impl ViewerConnection {
    /// Create a connection for an attached viewer
    pub fn new(
        stream_id: String,
        viewer_id: String,
        queue: mpsc::Receiver<MediaUnit>,
        session: Box<dyn ViewerSession>,
        registry: Arc<StreamRegistry>,
    ) -> Self {
        Self {
            stream_id,
            viewer_id,
            queue,
            session,
            registry,
            audio_only: false,
            idle_timeout: Duration::from_secs(10),
        }
    }

    /// Treat every unit as a keyframe
    pub fn audio_only(mut self, audio_only: bool) -> Self {
        self.audio_only = audio_only;
        self
    }

    /// Set the idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Deliver units until the session ends
    ///
    /// Video is held back until the first keyframe. The viewer is always
    /// detached and the session closed before returning.
    pub async fn run(mut self) -> ViewerExit {
        let exit = self.deliver().await;

        self.registry
            .detach_viewer(&self.stream_id, &self.viewer_id)
            .await;
        self.session.close().await;

        match &exit {
            ViewerExit::IdleTimeout => tracing::info!(
                stream = %self.stream_id,
                viewer = %self.viewer_id,
                "Viewer closed: no video"
            ),
            ViewerExit::WriteFailed(e) => tracing::debug!(
                stream = %self.stream_id,
                viewer = %self.viewer_id,
                error = %e,
                "Viewer closed: write failed"
            ),
            ViewerExit::QueueClosed => tracing::debug!(
                stream = %self.stream_id,
                viewer = %self.viewer_id,
                "Viewer closed: stream gone"
            ),
        }

        exit
    }

    async fn deliver(&mut self) -> ViewerExit {
        let idle = sleep(self.idle_timeout);
        tokio::pin!(idle);
        let mut started = false;

        loop {
            tokio::select! {
                _ = &mut idle => return ViewerExit::IdleTimeout,
                unit = self.queue.recv() => {
                    let Some(unit) = unit else {
                        return ViewerExit::QueueClosed;
                    };
                    if unit.is_keyframe || self.audio_only {
                        idle.as_mut().reset(Instant::now() + self.idle_timeout);
                        started = true;
                    }
                    if !started {
                        continue;
                    }
                    if let Err(e) = self.session.write_unit(&unit).await {
                        return ViewerExit::WriteFailed(e);
                    }
                }
            }
        }
    }
}
