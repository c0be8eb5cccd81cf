//! Peer connection layer
//!
//! [`PeerTransport`] is the seam between session logic and the WebRTC stack.
//! [`RtcPeerTransport`] implements it on webrtc-rs; tests substitute a
//! scripted transport. [`PeerSession`] drives negotiation on top of it.

mod rtc;
mod session;

pub use rtc::RtcPeerTransport;
pub use session::{NegotiationPhase, NegotiationState, PeerSession};

use crate::channels::ControlChannel;
use crate::events::GatheringState;
use crate::signaling::SessionDescription;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// Operations the session needs from a peer connection.
///
/// Implementations report asynchronous happenings (state changes, tracks,
/// channel lifecycle) through the event sender they were built with.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Register one inbound-only video transceiver
    async fn add_recvonly_video_slot(&self) -> Result<()>;

    /// Create an ordered, reliable data channel
    async fn create_control_channel(&self, label: &str) -> Result<Arc<dyn ControlChannel>>;

    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    /// Current local description, including gathered candidates
    async fn local_description(&self) -> Option<SessionDescription>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    /// Watch of the ICE gathering state; holds the current value
    fn gathering_state(&self) -> watch::Receiver<GatheringState>;

    /// Stop every transceiver and sender
    async fn stop_transceivers(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;
}
