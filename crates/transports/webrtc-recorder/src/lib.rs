//! RemoteMedia WebRTC dual-stream recorder
//!
//! Client side of a device streaming session: negotiates a peer connection
//! with a depth-camera server over a single HTTP offer/answer exchange,
//! receives its two video tracks (color and depth), tells them apart, and
//! records each into a downloadable artifact. A data channel carries
//! control messages alongside.
//!
//! # Architecture
//!
//! - [`config`]: [`SessionConfig`] (sent to the server) and [`ClientConfig`]
//! - [`signaling`]: the offer/answer exchange ([`HttpSignalingClient`])
//! - [`peer`]: [`PeerTransport`] seam, webrtc-rs implementation and the
//!   negotiation state machine ([`PeerSession`])
//! - [`media`]: track model and the role classifier
//! - [`recording`]: per-role recorders and artifact sinks
//! - [`channels`]: the control data channel
//! - [`session`]: [`Session`], which wires everything together
//!
//! # Example
//!
//! ```no_run
//! use remotemedia_webrtc_recorder::{ClientConfig, Role, Session, SessionConfig};
//!
//! # async fn run() -> remotemedia_webrtc_recorder::Result<()> {
//! let client = ClientConfig::new("http://192.168.1.20:8081").with_output_dir("./recordings");
//! let session = Session::configure(SessionConfig::default(), client).await?;
//! session.on_role_ready(Role::Depth, |stream| println!("depth: {}", stream.id()));
//! session.start().await?;
//! session.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod channels;
pub mod config;
pub mod error;
pub mod events;
pub mod media;
pub mod peer;
pub mod recording;
pub mod session;
pub mod signaling;

pub use channels::{ChannelMessage, ControlChannel, ControlMessage, DataChannelHandle, DataChannelState};
pub use config::{
    ClientConfig, ContainerFormat, IceServerConfig, MedianFilter, MonoCameraResolution, RecordingConfig,
    SessionConfig,
};
pub use error::{Error, Result};
pub use events::{EventQueue, EventSender, GatheringState, SessionEvent};
pub use media::{
    Classification, ClassificationAnomaly, MediaStream, RemoteTrack, Role, RoleBindings,
    TrackClassifier, TrackKind,
};
pub use peer::{NegotiationPhase, NegotiationState, PeerSession, PeerTransport, RtcPeerTransport};
pub use recording::{
    Artifact, ArtifactSink, Container, DownloadDirSink, MemorySink, RecorderState, StreamRecorder,
};
pub use session::Session;
pub use signaling::{HttpSignalingClient, SdpType, SessionDescription, Signaling, SignalingAnswer};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
