//! Error types for the dual-stream recorder client

/// Result type alias using the recorder Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while negotiating, classifying or recording
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Offer creation or local/remote description application failed
    #[error("Negotiation error: {0}")]
    NegotiationError(String),

    /// The offer/answer round trip failed (network, status, or payload)
    #[error("Signaling error: {0}")]
    SignalingError(String),

    /// An inbound track could not be bound to a role.
    ///
    /// Never propagated out of the session; logged and counted.
    #[error("Classification anomaly: {0}")]
    ClassificationAnomaly(String),

    /// The recording pipeline rejected the stream it was given
    #[error("Recorder initialization failed: {0}")]
    RecorderInitError(String),

    /// Operation not valid in the current session phase
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Data channel error
    #[error("Data channel error: {0}")]
    DataChannelError(String),

    /// Recorded packets could not be written into the output container
    #[error("Container error: {0}")]
    ContainerError(String),

    /// Media track error
    #[error("Media track error: {0}")]
    MediaTrackError(String),

    /// WebRTC library error
    #[error("WebRTC error: {0}")]
    WebRtcError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if a caller could reasonably retry the failed operation.
    ///
    /// The session itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::SignalingError(_) | Error::IoError(_))
    }

    /// Check if this error aborted session negotiation
    pub fn is_negotiation_failure(&self) -> bool {
        matches!(
            self,
            Error::NegotiationError(_) | Error::SignalingError(_)
        )
    }

    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::InvalidConfig(format!("Failed to parse TOML: {}", e))
    }
}
