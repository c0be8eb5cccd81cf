//! Test harness for the dual-stream recorder
//!
//! Provides:
//! - [`MockTransport`]: scripted [`PeerTransport`] that journals every call
//! - [`ScriptedSignaling`]: in-process [`Signaling`] with canned answers
//! - [`JournalSink`]: artifact sink writing into the same journal
//! - [`FakeSignalingServer`]: axum `/offer` endpoint on a random port
//! - [`ChunkFeed`]: chunk source the test pushes into
//!
//! The shared [`Journal`] makes teardown ordering assertable.

#![allow(dead_code)]

pub mod mock_transport;
pub mod signaling_server;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use remotemedia_webrtc_recorder::media::ChunkSource;
use remotemedia_webrtc_recorder::{
    Artifact, ArtifactSink, ClientConfig, Error, EventQueue, Result, SessionConfig,
    SessionDescription, Session, Signaling, SignalingAnswer,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub use mock_transport::{MockTransport, TransportScript};
pub use signaling_server::{FakeResponse, FakeSignalingServer};

/// Result type for test harness operations
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

/// Error type for test harness operations
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Ordered log of observable side effects
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Index of the first entry starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

/// Artifact sink that journals deliveries and keeps the artifacts
pub struct JournalSink {
    journal: Journal,
    artifacts: Mutex<Vec<Artifact>>,
}

impl JournalSink {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            artifacts: Mutex::new(Vec::new()),
        }
    }

    pub fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts.lock().clone()
    }
}

#[async_trait]
impl ArtifactSink for JournalSink {
    async fn deliver(&self, artifact: Artifact) -> Result<()> {
        self.journal.record(format!("artifact:{}", artifact.role));
        self.artifacts.lock().push(artifact);
        Ok(())
    }
}

/// How [`ScriptedSignaling`] responds
#[derive(Clone)]
pub enum SignalingScript {
    Answer { sdp: String, video_ids: Vec<String> },
    Fail(String),
}

/// In-process signaling with a canned response
pub struct ScriptedSignaling {
    script: SignalingScript,
    journal: Journal,
    received: Mutex<Vec<(SessionDescription, SessionConfig)>>,
}

impl ScriptedSignaling {
    pub fn answering(journal: Journal) -> Self {
        Self::new(
            SignalingScript::Answer {
                sdp: "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=answer\r\n".to_string(),
                video_ids: vec!["pc1_rgb".to_string(), "pc1_depth".to_string()],
            },
            journal,
        )
    }

    pub fn failing(journal: Journal, reason: &str) -> Self {
        Self::new(SignalingScript::Fail(reason.to_string()), journal)
    }

    pub fn new(script: SignalingScript, journal: Journal) -> Self {
        Self {
            script,
            journal,
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<(SessionDescription, SessionConfig)> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl Signaling for ScriptedSignaling {
    async fn exchange(
        &self,
        offer: &SessionDescription,
        config: &SessionConfig,
    ) -> Result<SignalingAnswer> {
        self.journal.record("exchange");
        self.received.lock().push((offer.clone(), config.clone()));
        match &self.script {
            SignalingScript::Answer { sdp, video_ids } => Ok(SignalingAnswer {
                description: SessionDescription::answer(sdp.clone()),
                video_ids: video_ids.clone(),
            }),
            SignalingScript::Fail(reason) => Err(Error::SignalingError(reason.clone())),
        }
    }
}

/// Chunk source fed by the test through a sender
pub struct ChunkFeed {
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Bytes>>,
}

impl ChunkFeed {
    pub fn new() -> (mpsc::UnboundedSender<Bytes>, Arc<Self>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Arc::new(Self {
                rx: tokio::sync::Mutex::new(rx),
            }),
        )
    }
}

#[async_trait]
impl ChunkSource for ChunkFeed {
    async fn next_chunk(&self) -> Option<Bytes> {
        self.rx.lock().await.recv().await
    }
}

/// A session wired to mocks, with handles to all of them
pub struct MockSession {
    pub session: Session,
    pub transport: Arc<MockTransport>,
    pub signaling: Arc<ScriptedSignaling>,
    pub sink: Arc<JournalSink>,
    pub journal: Journal,
}

impl MockSession {
    pub fn build(script: TransportScript, signaling_ok: bool) -> Self {
        Self::build_with(SessionConfig::default(), script, signaling_ok)
    }

    pub fn build_with(config: SessionConfig, script: TransportScript, signaling_ok: bool) -> Self {
        let journal = Journal::default();
        let queue = EventQueue::new();
        let transport = Arc::new(MockTransport::new(queue.sender(), journal.clone(), script));
        let signaling = Arc::new(if signaling_ok {
            ScriptedSignaling::answering(journal.clone())
        } else {
            ScriptedSignaling::failing(journal.clone(), "server returned 500")
        });
        let sink = Arc::new(JournalSink::new(journal.clone()));
        let client = ClientConfig::default().with_teardown_grace(Duration::from_millis(10));

        let session = Session::with_components(
            config,
            client,
            queue,
            transport.clone(),
            signaling.clone(),
            sink.clone(),
        )
        .expect("session builds");

        Self {
            session,
            transport,
            signaling,
            sink,
            journal,
        }
    }
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses
pub async fn wait_until<F>(timeout: Duration, what: &str, mut condition: F) -> HarnessResult<()>
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            return Err(HarnessError::Timeout(what.to_string()));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}
