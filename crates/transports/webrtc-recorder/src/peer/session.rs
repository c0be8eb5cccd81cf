//! Negotiation state machine
//!
//! ```text
//! New -> Offering -> Gathering -> Exchanging -> Connected -> Closed
//!   \________\___________\____________\___ (any failure) __/
//! ```
//!
//! Offering creates and applies the local offer. Gathering waits for ICE
//! gathering to complete (no timeout). Exchanging sends the complete offer
//! through [`Signaling`] and applies the answer. A failure at any step stops
//! every transceiver, closes the transport and lands in `Closed`.

use super::PeerTransport;
use crate::config::SessionConfig;
use crate::events::{
    ConnectionState, GatheringState, IceConnectionState, SessionEvent, SignalingState,
};
use crate::signaling::{SessionDescription, Signaling};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Negotiation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegotiationPhase {
    #[default]
    New,
    Offering,
    Gathering,
    Exchanging,
    Connected,
    Closed,
}

/// Snapshot of negotiation progress.
///
/// Transport-driven fields mirror what the transport reported; this layer
/// never sets them itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NegotiationState {
    pub phase: NegotiationPhase,
    pub local_description: Option<SessionDescription>,
    pub remote_description: Option<SessionDescription>,
    pub ice_gathering_state: GatheringState,
    pub ice_connection_state: IceConnectionState,
    pub connection_state: ConnectionState,
    pub signaling_state: SignalingState,
    /// Track names announced in the answer
    pub remote_video_ids: Vec<String>,
}

/// Drives one peer connection through negotiation and teardown
pub struct PeerSession {
    session_id: String,
    transport: Arc<dyn PeerTransport>,
    signaling: Arc<dyn Signaling>,
    state: Mutex<NegotiationState>,
    closed: watch::Sender<bool>,
}

impl PeerSession {
    pub fn new(
        session_id: impl Into<String>,
        transport: Arc<dyn PeerTransport>,
        signaling: Arc<dyn Signaling>,
    ) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            session_id: session_id.into(),
            transport,
            signaling,
            state: Mutex::new(NegotiationState::default()),
            closed,
        }
    }

    pub fn phase(&self) -> NegotiationPhase {
        self.state.lock().phase
    }

    pub fn state(&self) -> NegotiationState {
        self.state.lock().clone()
    }

    pub fn transport(&self) -> &Arc<dyn PeerTransport> {
        &self.transport
    }

    /// Register the two inbound video slots, RGB first then depth
    pub async fn register_video_slots(&self) -> Result<()> {
        for slot in crate::media::Role::ALL {
            self.transport.add_recvonly_video_slot().await?;
            debug!("Registered recv-only video slot for {}", slot);
        }
        Ok(())
    }

    /// Run negotiation to `Connected`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` if negotiation already started
    /// - `Error::NegotiationError` if the offer or a description cannot be
    ///   applied, or the session was closed mid-way
    /// - `Error::SignalingError` if the exchange fails
    ///
    /// On error the transport has been torn down and the phase is `Closed`.
    #[instrument(skip(self, config), fields(session_id = %self.session_id))]
    pub async fn negotiate(&self, config: &SessionConfig) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.phase != NegotiationPhase::New {
                return Err(Error::InvalidState(format!(
                    "negotiation cannot start from {:?}",
                    state.phase
                )));
            }
            state.phase = NegotiationPhase::Offering;
            debug!("Negotiation: New -> Offering");
        }

        match self.run(config).await {
            Ok(()) => {
                info!("Negotiation complete");
                Ok(())
            }
            Err(e) => {
                warn!("Negotiation failed: {}", e);
                self.shutdown().await;
                Err(e)
            }
        }
    }

    async fn run(&self, config: &SessionConfig) -> Result<()> {
        let offer = self.transport.create_offer().await?;
        self.transport.set_local_description(offer).await?;

        self.advance(NegotiationPhase::Gathering)?;
        self.wait_for_gathering_complete().await;

        self.advance(NegotiationPhase::Exchanging)?;
        let local = self.transport.local_description().await.ok_or_else(|| {
            Error::NegotiationError("No local description after gathering".to_string())
        })?;
        self.state.lock().local_description = Some(local.clone());

        let answer = self.signaling.exchange(&local, config).await?;
        self.ensure_open()?;

        self.transport
            .set_remote_description(answer.description.clone())
            .await?;
        {
            let mut state = self.state.lock();
            state.remote_description = Some(answer.description);
            state.remote_video_ids = answer.video_ids;
        }

        self.advance(NegotiationPhase::Connected)
    }

    /// Resolve once ICE gathering is complete or the session is closed.
    ///
    /// The current value is checked before waiting, so a transition that
    /// happened earlier is not missed.
    pub async fn wait_for_gathering_complete(&self) {
        let mut gathering = self.transport.gathering_state();
        let mut closed = self.closed.subscribe();

        tokio::select! {
            result = gathering.wait_for(|s| *s == GatheringState::Complete) => {
                if result.is_err() {
                    debug!("Gathering state source dropped");
                }
            }
            _ = closed.wait_for(|c| *c) => {
                debug!("Closed while waiting for ICE gathering");
            }
        }
    }

    fn advance(&self, next: NegotiationPhase) -> Result<()> {
        let mut state = self.state.lock();
        if state.phase == NegotiationPhase::Closed {
            return Err(Error::NegotiationError(
                "session closed during negotiation".to_string(),
            ));
        }
        debug!("Negotiation: {:?} -> {:?}", state.phase, next);
        state.phase = next;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.phase() == NegotiationPhase::Closed {
            return Err(Error::NegotiationError(
                "session closed during negotiation".to_string(),
            ));
        }
        Ok(())
    }

    /// Mark the session closed.
    ///
    /// Returns `true` for the call that performed the transition; only that
    /// caller should release the transport.
    pub fn mark_closed(&self) -> bool {
        let mut state = self.state.lock();
        if state.phase == NegotiationPhase::Closed {
            return false;
        }
        debug!("Negotiation: {:?} -> Closed", state.phase);
        state.phase = NegotiationPhase::Closed;
        drop(state);
        self.closed.send_replace(true);
        true
    }

    /// Stop every transceiver, then close the transport. Errors are logged.
    pub async fn release_transport(&self) {
        if let Err(e) = self.transport.stop_transceivers().await {
            warn!("Failed to stop transceivers: {}", e);
        }
        if let Err(e) = self.transport.close().await {
            warn!("Failed to close transport: {}", e);
        }
    }

    /// Close and release, once
    pub async fn shutdown(&self) {
        if self.mark_closed() {
            self.release_transport().await;
        }
    }

    /// Record a transport notification
    pub fn observe(&self, event: &SessionEvent) {
        let mut state = self.state.lock();
        match event {
            SessionEvent::GatheringStateChanged(s) => {
                info!("[PC] ICE gathering state: {:?}", s);
                state.ice_gathering_state = *s;
            }
            SessionEvent::IceConnectionStateChanged(s) => {
                info!("[PC] ICE connection state: {:?}", s);
                state.ice_connection_state = *s;
            }
            SessionEvent::ConnectionStateChanged(s) => {
                info!("[PC] Connection state: {:?}", s);
                state.connection_state = *s;
            }
            SessionEvent::SignalingStateChanged(s) => {
                info!("[PC] Signaling state: {:?}", s);
                state.signaling_state = *s;
            }
            _ => {}
        }
    }
}
