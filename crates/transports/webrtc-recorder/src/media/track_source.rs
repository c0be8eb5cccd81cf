//! Chunk source backed by a webrtc-rs remote track
//!
//! Each chunk is one whole RTP packet (header and payload, marshalled).
//! The recorder needs the header: marker bits delimit frames when the
//! packets are written into a container.

use super::{ChunkSource, RemoteTrack, TrackKind};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_remote::TrackRemote;
use webrtc::util::Marshal;

pub struct RtpChunkSource {
    track: Arc<TrackRemote>,
}

impl RtpChunkSource {
    pub fn new(track: Arc<TrackRemote>) -> Self {
        Self { track }
    }

    /// Wrap a remote track in the transport-neutral [`RemoteTrack`]
    pub fn into_remote_track(track: Arc<TrackRemote>) -> RemoteTrack {
        let kind = match track.kind() {
            RTPCodecType::Video => TrackKind::Video,
            _ => TrackKind::Audio,
        };
        let id = track.id().to_string();
        let codec = track.codec().capability.mime_type;
        RemoteTrack::new(id, kind, Arc::new(Self::new(track))).with_codec(codec)
    }
}

#[async_trait]
impl ChunkSource for RtpChunkSource {
    async fn next_chunk(&self) -> Option<Bytes> {
        loop {
            let packet = match self.track.read_rtp().await {
                Ok((packet, _attributes)) => packet,
                Err(e) => {
                    debug!("Track {} ended: {}", self.track.id(), e);
                    return None;
                }
            };

            match packet.marshal() {
                Ok(data) => return Some(data),
                Err(e) => warn!(
                    "Skipping RTP packet {} on track {}: {}",
                    packet.header.sequence_number,
                    self.track.id(),
                    e
                ),
            }
        }
    }
}
