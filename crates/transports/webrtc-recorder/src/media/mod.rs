//! Inbound media model
//!
//! Remote tracks arrive anonymous: the server does not label which one is
//! the color stream and which one is depth. [`classifier`] decides, and
//! [`track_source`] adapts webrtc-rs tracks into chunk sources the
//! recorders can drain.

pub mod classifier;
pub mod track_source;

pub use classifier::{
    classify, Classification, ClassificationAnomaly, RoleBindings, TrackClassifier,
};
pub use track_source::RtpChunkSource;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Role a video track plays in the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Color camera stream
    Rgb,
    /// Stereo depth stream
    Depth,
}

impl Role {
    /// Slot order: transceivers are registered RGB first, then depth
    pub const ALL: [Role; 2] = [Role::Rgb, Role::Depth];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Rgb => "rgb",
            Role::Depth => "depth",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media kind of a remote track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Source of encoded media chunks for one remote track
#[async_trait]
pub trait ChunkSource: Send + Sync {
    /// Next chunk in arrival order, or `None` once the track has ended
    async fn next_chunk(&self) -> Option<Bytes>;
}

/// A remote track as delivered by the transport
#[derive(Clone)]
pub struct RemoteTrack {
    id: String,
    kind: TrackKind,
    /// Negotiated codec MIME type, e.g. `video/VP8`
    codec: Option<String>,
    source: Option<Arc<dyn ChunkSource>>,
}

impl RemoteTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind, source: Arc<dyn ChunkSource>) -> Self {
        Self {
            id: id.into(),
            kind,
            codec: None,
            source: Some(source),
        }
    }

    /// A track whose media cannot be read (recording it will fail)
    pub fn without_source(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
            codec: None,
            source: None,
        }
    }

    pub fn with_codec(mut self, mime_type: impl Into<String>) -> Self {
        self.codec = Some(mime_type.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn codec(&self) -> Option<&str> {
        self.codec.as_deref()
    }

    pub fn source(&self) -> Option<&Arc<dyn ChunkSource>> {
        self.source.as_ref()
    }
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("codec", &self.codec)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

/// Stream handed to role-ready callbacks and recorders
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<RemoteTrack>,
}

impl MediaStream {
    /// Wrap a single track in its own stream
    pub fn single(track: RemoteTrack) -> Self {
        Self {
            id: format!("stream-{}", track.id()),
            tracks: vec![track],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[RemoteTrack] {
        &self.tracks
    }

    pub fn video_track(&self) -> Option<&RemoteTrack> {
        self.tracks.iter().find(|t| t.kind() == TrackKind::Video)
    }
}
