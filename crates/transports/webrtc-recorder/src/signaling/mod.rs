//! Offer/answer signaling with the device server
//!
//! Signaling is a single request/response round trip: the fully gathered
//! local offer and the [`SessionConfig`] go out, the remote answer comes
//! back. No trickle ICE and no retries.

mod http;

pub use http::HttpSignalingClient;

use crate::config::SessionConfig;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// SDP description type as carried in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// A session description in the `{sdp, type}` shape used on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub sdp: String,
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp: sdp.into(),
            sdp_type: SdpType::Offer,
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp: sdp.into(),
            sdp_type: SdpType::Answer,
        }
    }
}

/// Request body for `POST {base}/offer`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferRequest {
    pub sdp: String,
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub options: SessionConfig,
}

/// Response body from `POST {base}/offer`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub sdp: String,
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    /// Track names the server assigned (`<pc_id>_rgb`, `<pc_id>_depth`).
    /// Informational; track roles are decided by arrival order.
    #[serde(default)]
    pub video_ids: Vec<String>,
}

/// The remote side of a completed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingAnswer {
    pub description: SessionDescription,
    pub video_ids: Vec<String>,
}

/// Performs the offer/answer exchange
#[async_trait]
pub trait Signaling: Send + Sync {
    /// Send the local offer with the session configuration and return the
    /// remote answer.
    ///
    /// # Errors
    ///
    /// `Error::SignalingError` if the call does not complete, the server
    /// responds with a non-success status, or the payload is not an answer.
    async fn exchange(
        &self,
        offer: &SessionDescription,
        config: &SessionConfig,
    ) -> Result<SignalingAnswer>;
}
