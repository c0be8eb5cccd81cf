//! HTTP signaling client
//!
//! Posts the local offer to `{base_url}/offer` and parses the answer.

use super::{AnswerResponse, OfferRequest, SdpType, SessionDescription, Signaling, SignalingAnswer};
use crate::config::{ClientConfig, SessionConfig};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// HTTP client for the device server's offer endpoint
pub struct HttpSignalingClient {
    /// Base URL (e.g., "http://localhost:8081")
    base_url: String,

    /// Reqwest HTTP client
    client: reqwest::Client,
}

impl HttpSignalingClient {
    /// Create a new signaling client
    ///
    /// # Arguments
    ///
    /// * `base_url` - Server base URL (e.g., "http://localhost:8081")
    /// * `timeout` - Upper bound on the whole request
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();

        if base_url.is_empty() {
            return Err(Error::InvalidConfig(
                "signaling base_url cannot be empty".to_string(),
            ));
        }

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "signaling base_url must start with http:// or https://, got: {}",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::SignalingError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(config.signaling_url.clone(), config.request_timeout())
    }

    pub fn offer_url(&self) -> String {
        format!("{}/offer", self.base_url)
    }
}

#[async_trait]
impl Signaling for HttpSignalingClient {
    #[instrument(skip(self, offer, config), fields(url = %self.offer_url()))]
    async fn exchange(
        &self,
        offer: &SessionDescription,
        config: &SessionConfig,
    ) -> Result<SignalingAnswer> {
        let request = OfferRequest {
            sdp: offer.sdp.clone(),
            sdp_type: offer.sdp_type,
            options: config.clone(),
        };

        debug!("Posting offer ({} bytes of SDP)", request.sdp.len());

        let response = self
            .client
            .post(self.offer_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::SignalingError(format!("Offer request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::SignalingError(format!(
                "Server returned {}: {}",
                status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::SignalingError(format!("Failed to read answer body: {}", e)))?;

        let answer: AnswerResponse = serde_json::from_str(&body)
            .map_err(|e| Error::SignalingError(format!("Malformed answer payload: {}", e)))?;

        if answer.sdp_type != SdpType::Answer {
            return Err(Error::SignalingError(format!(
                "Expected an answer, got {:?}",
                answer.sdp_type
            )));
        }

        info!(
            video_ids = ?answer.video_ids,
            "Received answer ({} bytes of SDP)",
            answer.sdp.len()
        );

        Ok(SignalingAnswer {
            description: SessionDescription::answer(answer.sdp),
            video_ids: answer.video_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_base_url() {
        let err = HttpSignalingClient::new("ws://localhost:8081", Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(err.is_config_error());
        assert!(HttpSignalingClient::new("", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_offer_url_trims_trailing_slash() {
        let client = HttpSignalingClient::new("http://device:8081/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.offer_url(), "http://device:8081/offer");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_signaling_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let client = HttpSignalingClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client
            .exchange(&SessionDescription::offer("v=0"), &SessionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SignalingError(_)));
    }
}
