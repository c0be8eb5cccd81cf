//! webrtc-rs implementation of [`PeerTransport`]

use super::PeerTransport;
use crate::channels::ControlChannel;
use crate::config::ClientConfig;
use crate::events::{
    ConnectionState, EventSender, GatheringState, IceConnectionState, SessionEvent,
    SignalingState,
};
use crate::media::RtpChunkSource;
use crate::signaling::{SdpType, SessionDescription};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;

/// Peer connection backed by webrtc-rs
pub struct RtcPeerTransport {
    peer_connection: Arc<RTCPeerConnection>,
    events: EventSender,
    gathering: Arc<watch::Sender<GatheringState>>,
}

impl RtcPeerTransport {
    /// Build a peer connection and wire its callbacks into `events`
    ///
    /// # Arguments
    ///
    /// * `config` - ICE servers are taken from here
    /// * `events` - Queue receiving state changes, tracks and channel events
    #[instrument(skip_all)]
    pub async fn new(config: &ClientConfig, events: EventSender) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::WebRtcError(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine).map_err(|e| {
                Error::WebRtcError(format!("Failed to register interceptors: {}", e))
            })?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let ice_servers: Vec<RTCIceServer> = config
            .ice_servers
            .iter()
            .map(|server| {
                #[allow(clippy::needless_update)]
                RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                }
            })
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let peer_connection =
            Arc::new(api.new_peer_connection(rtc_config).await.map_err(|e| {
                Error::WebRtcError(format!("Failed to create peer connection: {}", e))
            })?);

        let (gathering_tx, _) = watch::channel(GatheringState::New);
        let transport = Self {
            peer_connection,
            events,
            gathering: Arc::new(gathering_tx),
        };
        transport.install_handlers();

        info!(
            "Created peer connection with {} ICE server(s)",
            config.ice_servers.len()
        );
        Ok(transport)
    }

    /// Access the underlying peer connection
    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.peer_connection
    }

    fn install_handlers(&self) {
        let events = self.events.clone();
        let gathering = Arc::clone(&self.gathering);
        self.peer_connection
            .on_ice_gathering_state_change(Box::new(move |s: RTCIceGathererState| {
                let state = match s {
                    RTCIceGathererState::Gathering => Some(GatheringState::Gathering),
                    RTCIceGathererState::Complete => Some(GatheringState::Complete),
                    RTCIceGathererState::New => Some(GatheringState::New),
                    _ => None,
                };
                if let Some(state) = state {
                    gathering.send_replace(state);
                    let _ = events.send(SessionEvent::GatheringStateChanged(state));
                }
                Box::pin(async {})
            }));

        let events = self.events.clone();
        self.peer_connection
            .on_ice_connection_state_change(Box::new(move |s: RTCIceConnectionState| {
                let state = match s {
                    RTCIceConnectionState::New => Some(IceConnectionState::New),
                    RTCIceConnectionState::Checking => Some(IceConnectionState::Checking),
                    RTCIceConnectionState::Connected => Some(IceConnectionState::Connected),
                    RTCIceConnectionState::Completed => Some(IceConnectionState::Completed),
                    RTCIceConnectionState::Disconnected => Some(IceConnectionState::Disconnected),
                    RTCIceConnectionState::Failed => Some(IceConnectionState::Failed),
                    RTCIceConnectionState::Closed => Some(IceConnectionState::Closed),
                    _ => None,
                };
                if let Some(state) = state {
                    let _ = events.send(SessionEvent::IceConnectionStateChanged(state));
                }
                Box::pin(async {})
            }));

        let events = self.events.clone();
        self.peer_connection
            .on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
                let state = match s {
                    RTCPeerConnectionState::New => Some(ConnectionState::New),
                    RTCPeerConnectionState::Connecting => Some(ConnectionState::Connecting),
                    RTCPeerConnectionState::Connected => Some(ConnectionState::Connected),
                    RTCPeerConnectionState::Disconnected => Some(ConnectionState::Disconnected),
                    RTCPeerConnectionState::Failed => Some(ConnectionState::Failed),
                    RTCPeerConnectionState::Closed => Some(ConnectionState::Closed),
                    _ => None,
                };
                if let Some(state) = state {
                    let _ = events.send(SessionEvent::ConnectionStateChanged(state));
                }
                Box::pin(async {})
            }));

        let events = self.events.clone();
        self.peer_connection
            .on_signaling_state_change(Box::new(move |s: RTCSignalingState| {
                let state = match s {
                    RTCSignalingState::Stable => Some(SignalingState::Stable),
                    RTCSignalingState::HaveLocalOffer => Some(SignalingState::HaveLocalOffer),
                    RTCSignalingState::HaveRemoteOffer => Some(SignalingState::HaveRemoteOffer),
                    RTCSignalingState::HaveLocalPranswer => Some(SignalingState::HaveLocalPranswer),
                    RTCSignalingState::HaveRemotePranswer => {
                        Some(SignalingState::HaveRemotePranswer)
                    }
                    RTCSignalingState::Closed => Some(SignalingState::Closed),
                    _ => None,
                };
                if let Some(state) = state {
                    let _ = events.send(SessionEvent::SignalingStateChanged(state));
                }
                Box::pin(async {})
            }));

        let events = self.events.clone();
        self.peer_connection
            .on_track(Box::new(move |track, _receiver, _transceiver| {
                let codec = track.codec();
                debug!(
                    "Remote track {} arrived: kind={}, codec={}",
                    track.id(),
                    track.kind(),
                    codec.capability.mime_type
                );
                let remote = RtpChunkSource::into_remote_track(track);
                let _ = events.send(SessionEvent::TrackArrived(remote));
                Box::pin(async {})
            }));
    }
}

fn to_rtc_description(description: SessionDescription) -> Result<RTCSessionDescription> {
    let parsed = match description.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(description.sdp),
        SdpType::Answer => RTCSessionDescription::answer(description.sdp),
        SdpType::Pranswer => RTCSessionDescription::pranswer(description.sdp),
        SdpType::Rollback => {
            return Err(Error::NegotiationError(
                "rollback descriptions are not supported".to_string(),
            ))
        }
    };
    parsed.map_err(|e| Error::NegotiationError(format!("Failed to parse SDP: {}", e)))
}

fn from_rtc_description(description: &RTCSessionDescription) -> Option<SessionDescription> {
    let sdp_type = match description.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        _ => return None,
    };
    Some(SessionDescription {
        sdp: description.sdp.clone(),
        sdp_type,
    })
}

#[async_trait]
impl PeerTransport for RtcPeerTransport {
    async fn add_recvonly_video_slot(&self) -> Result<()> {
        self.peer_connection
            .add_transceiver_from_kind(
                RTPCodecType::Video,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await
            .map_err(|e| Error::WebRtcError(format!("Failed to add video transceiver: {}", e)))?;
        Ok(())
    }

    async fn create_control_channel(&self, label: &str) -> Result<Arc<dyn ControlChannel>> {
        let init = RTCDataChannelInit {
            ordered: Some(true),
            ..Default::default()
        };

        let channel = self
            .peer_connection
            .create_data_channel(label, Some(init))
            .await
            .map_err(|e| {
                Error::DataChannelError(format!("Failed to create data channel: {}", e))
            })?;

        Ok(Arc::new(RtcControlChannel::wire(channel, self.events.clone())))
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| Error::NegotiationError(format!("Failed to create offer: {}", e)))?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        let description = to_rtc_description(description)?;
        self.peer_connection
            .set_local_description(description)
            .await
            .map_err(|e| {
                Error::NegotiationError(format!("Failed to set local description: {}", e))
            })
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.peer_connection
            .local_description()
            .await
            .as_ref()
            .and_then(from_rtc_description)
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        let description = to_rtc_description(description)?;
        self.peer_connection
            .set_remote_description(description)
            .await
            .map_err(|e| {
                Error::NegotiationError(format!("Failed to set remote description: {}", e))
            })
    }

    fn gathering_state(&self) -> watch::Receiver<GatheringState> {
        self.gathering.subscribe()
    }

    async fn stop_transceivers(&self) -> Result<()> {
        for transceiver in self.peer_connection.get_transceivers().await {
            if let Err(e) = transceiver.stop().await {
                warn!("Failed to stop transceiver: {}", e);
            }
        }
        for sender in self.peer_connection.get_senders().await {
            if let Err(e) = sender.stop().await {
                warn!("Failed to stop sender: {}", e);
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection
            .close()
            .await
            .map_err(|e| Error::WebRtcError(format!("Failed to close connection: {}", e)))
    }
}

/// Data channel created on an [`RtcPeerTransport`]
struct RtcControlChannel {
    label: String,
    channel: Arc<RTCDataChannel>,
}

impl RtcControlChannel {
    fn wire(channel: Arc<RTCDataChannel>, events: EventSender) -> Self {
        let label = channel.label().to_string();

        let open_events = events.clone();
        channel.on_open(Box::new(move || {
            let _ = open_events.send(SessionEvent::ChannelOpen);
            Box::pin(async {})
        }));

        let close_events = events.clone();
        channel.on_close(Box::new(move || {
            let _ = close_events.send(SessionEvent::ChannelClosed);
            Box::pin(async {})
        }));

        channel.on_message(Box::new(move |msg: DataChannelMessage| {
            let data: Bytes = msg.data;
            let _ = events.send(SessionEvent::ChannelMessage(data));
            Box::pin(async {})
        }));

        Self { label, channel }
    }
}

#[async_trait]
impl ControlChannel for RtcControlChannel {
    fn label(&self) -> &str {
        &self.label
    }

    async fn send_text(&self, text: String) -> Result<()> {
        self.channel
            .send_text(text)
            .await
            .map_err(|e| Error::DataChannelError(format!("Failed to send message: {}", e)))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.channel
            .close()
            .await
            .map_err(|e| Error::DataChannelError(format!("Failed to close data channel: {}", e)))
    }
}
