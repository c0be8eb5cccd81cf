//! Session event queue
//!
//! Transport callbacks and recorder pumps never touch session state
//! directly. They push a [`SessionEvent`] into one unbounded queue and a
//! single dispatcher applies events in order.

use crate::media::{RemoteTrack, Role};
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

/// ICE candidate gathering progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatheringState {
    #[default]
    New,
    Gathering,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IceConnectionState {
    #[default]
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalingState {
    #[default]
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPranswer,
    HaveRemotePranswer,
    Closed,
}

/// Everything that can happen to a running session
#[derive(Debug)]
pub enum SessionEvent {
    GatheringStateChanged(GatheringState),
    IceConnectionStateChanged(IceConnectionState),
    ConnectionStateChanged(ConnectionState),
    SignalingStateChanged(SignalingState),
    /// A remote track arrived (not yet classified)
    TrackArrived(RemoteTrack),
    /// A recorder pump read a chunk for `role`
    ChunkAvailable { role: Role, data: Bytes },
    ChannelOpen,
    ChannelClosed,
    ChannelMessage(Bytes),
    /// Acknowledged once every event queued before it has been applied
    Barrier(oneshot::Sender<()>),
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// The queue a session and its transport share
pub struct EventQueue {
    tx: EventSender,
    rx: EventReceiver,
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Sender to hand to a transport before the session is built
    pub fn sender(&self) -> EventSender {
        self.tx.clone()
    }

    pub(crate) fn into_parts(self) -> (EventSender, EventReceiver) {
        (self.tx, self.rx)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
