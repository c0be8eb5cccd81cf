//! Caller-facing recording session
//!
//! A [`Session`] ties together the peer negotiation, track classification,
//! the two per-role recorders and the control channel. Typical use:
//!
//! ```no_run
//! use remotemedia_webrtc_recorder::{ClientConfig, Role, Session, SessionConfig};
//!
//! # async fn run() -> remotemedia_webrtc_recorder::Result<()> {
//! let session = Session::configure(SessionConfig::default(), ClientConfig::default()).await?;
//! session.on_role_ready(Role::Rgb, |stream| println!("rgb ready: {}", stream.id()));
//! session.on_role_ready(Role::Depth, |stream| println!("depth ready: {}", stream.id()));
//! let _channel = session
//!     .create_control_channel(|| {}, || {}, |msg| println!("{:?}", msg.payload))
//!     .await?;
//! session.start().await?;
//! // ... later
//! session.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Ordering
//!
//! All transport notifications flow through one [`EventQueue`] and are
//! applied by a single dispatcher task. `stop()` halts the recorder pumps,
//! waits until every chunk they forwarded has been applied, and finalizes
//! the recorders before any transceiver is stopped or the transport closed.

use crate::channels::{ChannelMessage, ControlMessage, DataChannelHandle};
use crate::config::{ClientConfig, SessionConfig};
use crate::events::{EventQueue, EventSender, SessionEvent};
use crate::media::{MediaStream, RemoteTrack, Role, RoleBindings, TrackClassifier};
use crate::peer::{NegotiationPhase, NegotiationState, PeerSession, PeerTransport, RtcPeerTransport};
use crate::recording::{ArtifactSink, DownloadDirSink, RecorderState, StreamRecorder};
use crate::signaling::{HttpSignalingClient, Signaling};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

/// Upper bound on each step of the flush that precedes finalization
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Callback receiving the stream bound to a role
pub type RoleReadyCallback = Arc<dyn Fn(MediaStream) + Send + Sync>;

#[derive(Default)]
struct SessionInner {
    classifier: TrackClassifier,
    recorders: HashMap<Role, StreamRecorder>,
    role_callbacks: HashMap<Role, RoleReadyCallback>,
    channel: Option<DataChannelHandle>,
    slots_registered: bool,
    stopped: bool,
}

struct SessionShared {
    id: String,
    config: SessionConfig,
    client: ClientConfig,
    peer: PeerSession,
    sink: Arc<dyn ArtifactSink>,
    events: EventSender,
    inner: Mutex<SessionInner>,
}

/// One recording session against a device server
pub struct Session {
    shared: Arc<SessionShared>,
    dispatcher: JoinHandle<()>,
}

impl Session {
    /// Build a session on webrtc-rs, HTTP signaling and a directory sink
    ///
    /// # Arguments
    ///
    /// * `config` - Sent to the server as the offer's `options`
    /// * `client` - Local settings (server URL, ICE servers, output dir)
    pub async fn configure(config: SessionConfig, client: ClientConfig) -> Result<Self> {
        client.validate()?;
        let queue = EventQueue::new();
        let transport = RtcPeerTransport::new(&client, queue.sender()).await?;
        let signaling = HttpSignalingClient::from_config(&client)?;
        let sink = DownloadDirSink::new(client.recording.output_dir.clone());

        Self::with_components(
            config,
            client,
            queue,
            Arc::new(transport),
            Arc::new(signaling),
            Arc::new(sink),
        )
    }

    /// Build a session from explicit parts.
    ///
    /// `transport` must report its events into `queue`. Must be called
    /// inside a tokio runtime.
    pub fn with_components(
        config: SessionConfig,
        client: ClientConfig,
        queue: EventQueue,
        transport: Arc<dyn PeerTransport>,
        signaling: Arc<dyn Signaling>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Result<Self> {
        let config = config.normalized();
        config.validate()?;
        client.validate()?;

        let id = uuid::Uuid::new_v4().to_string();
        let (events, mut rx) = queue.into_parts();

        let shared = Arc::new(SessionShared {
            peer: PeerSession::new(id.clone(), transport, signaling),
            id,
            config,
            client,
            sink,
            events,
            inner: Mutex::new(SessionInner::default()),
        });

        let dispatch_shared = Arc::clone(&shared);
        let dispatcher = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                dispatch_shared.dispatch(event);
            }
        });

        info!(session_id = %shared.id, "Session configured");
        Ok(Self { shared, dispatcher })
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn phase(&self) -> NegotiationPhase {
        self.shared.peer.phase()
    }

    pub fn negotiation_state(&self) -> NegotiationState {
        self.shared.peer.state()
    }

    pub fn bindings(&self) -> RoleBindings {
        self.shared.inner.lock().classifier.bindings().clone()
    }

    /// Dropped video tracks so far
    pub fn anomaly_count(&self) -> usize {
        self.shared.inner.lock().classifier.anomaly_count()
    }

    pub fn recorder_state(&self, role: Role) -> Option<RecorderState> {
        self.shared
            .inner
            .lock()
            .recorders
            .get(&role)
            .map(StreamRecorder::state)
    }

    /// Chunks buffered so far for `role`, 0 when it has no recorder
    pub fn buffered_chunks(&self, role: Role) -> usize {
        self.shared
            .inner
            .lock()
            .recorders
            .get(&role)
            .map_or(0, StreamRecorder::buffered_chunks)
    }

    /// Sender for injecting events, e.g. from a transport built later
    pub fn event_sender(&self) -> EventSender {
        self.shared.events.clone()
    }

    /// Register the callback fired once when `role` is bound
    pub fn on_role_ready<F>(&self, role: Role, callback: F)
    where
        F: Fn(MediaStream) + Send + Sync + 'static,
    {
        self.shared
            .inner
            .lock()
            .role_callbacks
            .insert(role, Arc::new(callback));
    }

    /// Create the control data channel. Must precede `start()`.
    pub async fn create_control_channel<O, C, M>(
        &self,
        on_open: O,
        on_close: C,
        on_message: M,
    ) -> Result<DataChannelHandle>
    where
        O: Fn() + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
        M: Fn(ChannelMessage) + Send + Sync + 'static,
    {
        if self.phase() != NegotiationPhase::New {
            return Err(Error::InvalidState(
                "control channel must be created before start()".to_string(),
            ));
        }
        if self.shared.inner.lock().channel.is_some() {
            return Err(Error::DataChannelError(
                "control channel already created".to_string(),
            ));
        }

        let label = &self.shared.client.control_channel_label;
        let channel = self.shared.peer.transport().create_control_channel(label).await?;
        let handle = DataChannelHandle::new(
            channel,
            Box::new(on_open),
            Box::new(on_close),
            Box::new(on_message),
        );

        self.shared.inner.lock().channel = Some(handle.clone());
        debug!("Control channel '{}' created", label);
        Ok(handle)
    }

    /// Register the video slots and negotiate with the server.
    ///
    /// # Errors
    ///
    /// `Error::NegotiationError` or `Error::SignalingError` when negotiation
    /// fails; the session is then `Closed` with its transport released.
    #[instrument(skip(self), fields(session_id = %self.shared.id))]
    pub async fn start(&self) -> Result<()> {
        if self.phase() != NegotiationPhase::New {
            return Err(Error::InvalidState(format!(
                "start() called in phase {:?}",
                self.phase()
            )));
        }

        let register = {
            let mut inner = self.shared.inner.lock();
            !std::mem::replace(&mut inner.slots_registered, true)
        };
        if register {
            if let Err(e) = self.shared.peer.register_video_slots().await {
                self.shared.peer.shutdown().await;
                return Err(e);
            }
        }

        self.shared.peer.negotiate(&self.shared.config).await
    }

    /// Tear the session down.
    ///
    /// Sends STREAM_CLOSED if the control channel is open, waits the
    /// configured grace period, flushes chunks still in flight, finalizes
    /// both recorders, then stops transceivers and closes the transport.
    /// Later calls do nothing.
    #[instrument(skip(self), fields(session_id = %self.shared.id))]
    pub async fn stop(&self) -> Result<()> {
        let channel = {
            let mut inner = self.shared.inner.lock();
            if std::mem::replace(&mut inner.stopped, true) {
                debug!("stop() called again; ignoring");
                return Ok(());
            }
            inner.channel.clone()
        };

        if let Some(channel) = channel.as_ref().filter(|c| c.is_open()) {
            match channel.send(&ControlMessage::StreamClosed).await {
                Ok(()) => debug!("Sent STREAM_CLOSED"),
                Err(e) => warn!("Failed to send STREAM_CLOSED: {}", e),
            }
            tokio::time::sleep(self.shared.client.teardown_grace()).await;
        }

        let release = self.shared.peer.mark_closed();
        self.flush_recorders().await;

        let artifacts: Vec<_> = {
            let mut inner = self.shared.inner.lock();
            Role::ALL
                .iter()
                .filter_map(|role| inner.recorders.get_mut(role).and_then(StreamRecorder::stop))
                .collect()
        };

        for artifact in artifacts {
            let name = artifact.file_name.clone();
            if let Err(e) = self.shared.sink.deliver(artifact).await {
                error!("Failed to deliver {}: {}", name, e);
            }
        }

        if release {
            self.shared.peer.release_transport().await;
        }

        if let Some(channel) = channel {
            channel.handle_close();
        }

        info!("Session stopped");
        Ok(())
    }

    /// Drain the recorder pumps into the event queue, then wait for the
    /// dispatcher to apply everything queued so far.
    async fn flush_recorders(&self) {
        let pumps: Vec<_> = {
            let mut inner = self.shared.inner.lock();
            Role::ALL
                .iter()
                .filter_map(|role| {
                    inner
                        .recorders
                        .get_mut(role)
                        .and_then(StreamRecorder::halt_pump)
                        .map(|pump| (*role, pump))
                })
                .collect()
        };

        for (role, mut pump) in pumps {
            match tokio::time::timeout(FLUSH_TIMEOUT, &mut pump).await {
                Ok(Ok(())) => trace!("{} pump drained", role),
                Ok(Err(e)) => warn!("{} pump ended abnormally: {}", role, e),
                Err(_) => {
                    warn!("{} pump did not drain in time; abandoning it", role);
                    pump.abort();
                }
            }
        }

        let (ack, acked) = oneshot::channel();
        if self.shared.events.send(SessionEvent::Barrier(ack)).is_err() {
            warn!("Event dispatcher gone; finalizing with chunks applied so far");
            return;
        }
        match tokio::time::timeout(FLUSH_TIMEOUT, acked).await {
            Ok(Ok(())) => trace!("Event queue flushed"),
            Ok(Err(_)) => warn!("Event dispatcher dropped the flush barrier"),
            Err(_) => warn!("Event queue did not flush in time"),
        }
    }

    /// Apply one event synchronously.
    ///
    /// The dispatcher task calls this for every queued event; tests may
    /// call it directly to inject synthetic events.
    pub fn dispatch(&self, event: SessionEvent) {
        self.shared.dispatch(event);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

impl SessionShared {
    fn dispatch(&self, event: SessionEvent) {
        match event {
            SessionEvent::GatheringStateChanged(_)
            | SessionEvent::IceConnectionStateChanged(_)
            | SessionEvent::ConnectionStateChanged(_)
            | SessionEvent::SignalingStateChanged(_) => self.peer.observe(&event),
            SessionEvent::TrackArrived(track) => self.on_track(track),
            SessionEvent::ChunkAvailable { role, data } => {
                let mut inner = self.inner.lock();
                let accepted = inner
                    .recorders
                    .get_mut(&role)
                    .map(|r| r.on_chunk(data))
                    .unwrap_or(false);
                if !accepted {
                    trace!("Discarded chunk for {}", role);
                }
            }
            SessionEvent::ChannelOpen => {
                if let Some(channel) = self.channel() {
                    channel.handle_open();
                }
            }
            SessionEvent::ChannelClosed => {
                if let Some(channel) = self.channel() {
                    channel.handle_close();
                }
            }
            SessionEvent::ChannelMessage(data) => {
                if let Some(channel) = self.channel() {
                    channel.handle_message(&data);
                }
            }
            SessionEvent::Barrier(ack) => {
                let _ = ack.send(());
            }
        }
    }

    fn channel(&self) -> Option<DataChannelHandle> {
        self.inner.lock().channel.clone()
    }

    fn on_track(&self, track: RemoteTrack) {
        let (role, stream, callback) = {
            let mut inner = self.inner.lock();
            if inner.stopped {
                debug!("Ignoring track {} after stop", track.id());
                return;
            }

            let Some((role, stream)) = inner.classifier.on_track(track) else {
                return;
            };

            let mut recorder = StreamRecorder::new(role, &self.client.recording);
            let events = self.events.clone();
            let started = recorder.start(&stream, move |data| {
                let _ = events.send(SessionEvent::ChunkAvailable { role, data });
            });
            match started {
                Ok(()) => {
                    inner.recorders.insert(role, recorder);
                }
                Err(e) => warn!("Not recording {} stream: {}", role, e),
            }

            (role, stream, inner.role_callbacks.get(&role).cloned())
        };

        match callback {
            Some(callback) => callback(stream),
            None => debug!("No callback registered for {}", role),
        }
    }
}
