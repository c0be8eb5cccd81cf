//! Scripted peer transport

use super::Journal;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use remotemedia_webrtc_recorder::events::SessionEvent;
use remotemedia_webrtc_recorder::media::ChunkSource;
use remotemedia_webrtc_recorder::{
    ControlChannel, Error, EventSender, GatheringState, PeerTransport, RemoteTrack, Result,
    SessionDescription, TrackKind,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Knobs for [`MockTransport`]
#[derive(Debug, Clone)]
pub struct TransportScript {
    /// Report gathering complete as soon as the local description is set
    pub auto_complete_gathering: bool,
    pub fail_create_offer: bool,
    pub fail_set_remote: bool,
    /// Return no local description after gathering
    pub lose_local_description: bool,
}

impl Default for TransportScript {
    fn default() -> Self {
        Self {
            auto_complete_gathering: true,
            fail_create_offer: false,
            fail_set_remote: false,
            lose_local_description: false,
        }
    }
}

pub struct MockTransport {
    events: EventSender,
    journal: Journal,
    script: TransportScript,
    gathering: watch::Sender<GatheringState>,
    local: Mutex<Option<SessionDescription>>,
    remote: Mutex<Option<SessionDescription>>,
    active_slots: AtomicUsize,
}

impl MockTransport {
    pub fn new(events: EventSender, journal: Journal, script: TransportScript) -> Self {
        let (gathering, _) = watch::channel(GatheringState::New);
        Self {
            events,
            journal,
            script,
            gathering,
            local: Mutex::new(None),
            remote: Mutex::new(None),
            active_slots: AtomicUsize::new(0),
        }
    }

    pub fn active_slots(&self) -> usize {
        self.active_slots.load(Ordering::SeqCst)
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.remote.lock().clone()
    }

    pub fn set_gathering(&self, state: GatheringState) {
        self.gathering.send_replace(state);
        let _ = self.events.send(SessionEvent::GatheringStateChanged(state));
    }

    /// Deliver a video track whose chunks come from `source`
    pub fn emit_track(&self, id: &str, source: Arc<dyn ChunkSource>) {
        let track = RemoteTrack::new(id, TrackKind::Video, source);
        let _ = self.events.send(SessionEvent::TrackArrived(track));
    }

    /// Deliver a video track that reports `codec` as its MIME type
    pub fn emit_track_with_codec(&self, id: &str, codec: &str, source: Arc<dyn ChunkSource>) {
        let track = RemoteTrack::new(id, TrackKind::Video, source).with_codec(codec);
        let _ = self.events.send(SessionEvent::TrackArrived(track));
    }

    pub fn open_channel(&self) {
        let _ = self.events.send(SessionEvent::ChannelOpen);
    }

    pub fn push_channel_message(&self, text: &str) {
        let _ = self
            .events
            .send(SessionEvent::ChannelMessage(Bytes::copy_from_slice(text.as_bytes())));
    }
}

#[async_trait]
impl PeerTransport for MockTransport {
    async fn add_recvonly_video_slot(&self) -> Result<()> {
        let n = self.active_slots.fetch_add(1, Ordering::SeqCst) + 1;
        self.journal.record(format!("add_slot:{}", n));
        Ok(())
    }

    async fn create_control_channel(&self, label: &str) -> Result<Arc<dyn ControlChannel>> {
        self.journal.record(format!("create_channel:{}", label));
        Ok(Arc::new(MockChannel {
            label: label.to_string(),
            journal: self.journal.clone(),
        }))
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.journal.record("create_offer");
        if self.script.fail_create_offer {
            return Err(Error::NegotiationError("Failed to create offer: scripted".to_string()));
        }
        Ok(SessionDescription::offer("v=0\r\ns=offer\r\n"))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.journal.record("set_local");
        *self.local.lock() = Some(description);
        if self.script.auto_complete_gathering {
            self.set_gathering(GatheringState::Gathering);
            self.set_gathering(GatheringState::Complete);
        }
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        if self.script.lose_local_description {
            return None;
        }
        self.local.lock().clone().map(|mut d| {
            d.sdp.push_str("a=candidate:1 1 udp 2130706431 127.0.0.1 50000 typ host\r\n");
            d
        })
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.journal.record("set_remote");
        if self.script.fail_set_remote {
            return Err(Error::NegotiationError(
                "Failed to set remote description: scripted".to_string(),
            ));
        }
        *self.remote.lock() = Some(description);
        Ok(())
    }

    fn gathering_state(&self) -> watch::Receiver<GatheringState> {
        self.gathering.subscribe()
    }

    async fn stop_transceivers(&self) -> Result<()> {
        self.journal.record("stop_transceivers");
        self.active_slots.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.journal.record("close");
        Ok(())
    }
}

struct MockChannel {
    label: String,
    journal: Journal,
}

#[async_trait]
impl ControlChannel for MockChannel {
    fn label(&self) -> &str {
        &self.label
    }

    async fn send_text(&self, text: String) -> Result<()> {
        self.journal.record(format!("send:{}", text));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.journal.record("channel_close");
        Ok(())
    }
}
