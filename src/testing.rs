//! Test doubles for the external collaborators

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::media::{Codec, MediaUnit};
use crate::source::{DialOptions, SourceClient, SourceConnection, SourceError, SourceFeed};
use crate::viewer::{SessionError, SessionNegotiator, SessionOptions, ViewerSession};

/// Source client whose connections are driven by the test
///
/// Each successful dial hands its [`SourceFeed`] to the receiver returned by
/// [`MockSource::new`].
pub(crate) struct MockSource {
    reachable: AtomicBool,
    hang: AtomicBool,
    codecs: Mutex<Option<Vec<Codec>>>,
    dials: AtomicUsize,
    feeds: mpsc::UnboundedSender<SourceFeed>,
}

impl MockSource {
    pub(crate) fn new(
        codecs: Option<Vec<Codec>>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<SourceFeed>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Arc::new(Self {
            reachable: AtomicBool::new(true),
            hang: AtomicBool::new(false),
            codecs: Mutex::new(codecs),
            dials: AtomicUsize::new(0),
            feeds: tx,
        });
        (source, rx)
    }

    pub(crate) fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub(crate) fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    /// Number of dial attempts so far
    pub(crate) fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceClient for MockSource {
    async fn dial(&self, url: &str, _options: &DialOptions) -> Result<SourceConnection, SourceError> {
        self.dials.fetch_add(1, Ordering::SeqCst);

        if !self.reachable.load(Ordering::SeqCst) {
            return Err(SourceError::Unreachable(url.to_string()));
        }
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let codecs = self.codecs.lock().unwrap().clone();
        let (connection, feed) = SourceConnection::channel(codecs);
        let _ = self.feeds.send(feed);
        Ok(connection)
    }
}

/// Viewer session that records what it is given
pub(crate) struct MockSession {
    written: Arc<Mutex<Vec<MediaUnit>>>,
    closed: Arc<AtomicBool>,
    fail_writes: AtomicBool,
    fail_negotiation: bool,
}

impl MockSession {
    pub(crate) fn new() -> Self {
        Self {
            written: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            fail_writes: AtomicBool::new(false),
            fail_negotiation: false,
        }
    }

    pub(crate) fn written(&self) -> Arc<Mutex<Vec<MediaUnit>>> {
        Arc::clone(&self.written)
    }

    pub(crate) fn closed(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    pub(crate) fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ViewerSession for MockSession {
    async fn negotiate(&mut self, codecs: &[Codec], offer: &str) -> Result<String, SessionError> {
        if self.fail_negotiation {
            return Err(SessionError::Negotiation("rejected offer".into()));
        }
        Ok(format!("answer:{}:{}", codecs.len(), offer))
    }

    async fn write_unit(&mut self, unit: &MediaUnit) -> Result<(), SessionError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        self.written.lock().unwrap().push(unit.clone());
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Handles onto a session created by [`MockNegotiator`]
#[derive(Clone)]
pub(crate) struct SessionRecord {
    pub(crate) written: Arc<Mutex<Vec<MediaUnit>>>,
    pub(crate) closed: Arc<AtomicBool>,
}

/// Negotiator producing [`MockSession`]s
#[derive(Default)]
pub(crate) struct MockNegotiator {
    fail_negotiation: AtomicBool,
    sessions: Mutex<Vec<SessionRecord>>,
}

impl MockNegotiator {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn fail_negotiation(&self) {
        self.fail_negotiation.store(true, Ordering::SeqCst);
    }

    /// Records of every session created so far
    pub(crate) fn sessions(&self) -> Vec<SessionRecord> {
        self.sessions.lock().unwrap().clone()
    }
}

impl SessionNegotiator for MockNegotiator {
    fn create_session(&self, _options: &SessionOptions) -> Box<dyn ViewerSession> {
        let mut session = MockSession::new();
        session.fail_negotiation = self.fail_negotiation.load(Ordering::SeqCst);
        self.sessions.lock().unwrap().push(SessionRecord {
            written: session.written(),
            closed: session.closed(),
        });
        Box::new(session)
    }
}
