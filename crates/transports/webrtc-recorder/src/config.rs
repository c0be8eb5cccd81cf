//! Configuration types for the dual-stream recorder client
//!
//! Two layers of configuration live here:
//!
//! - [`SessionConfig`]: capture and inference parameters the remote device
//!   server receives verbatim as the `options` object of the offer request.
//!   Its serde representation IS the wire format.
//! - [`ClientConfig`]: local settings for this client (signaling endpoint,
//!   ICE servers, control channel, artifact output). Loadable from TOML.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Color camera width sent when none is given
pub const DEFAULT_CAM_WIDTH: u32 = 1920;

/// Color camera height sent when none is given
pub const DEFAULT_CAM_HEIGHT: u32 = 1080;

/// Neural network model identifiers the device server ships with
pub const KNOWN_NN_MODELS: [&str; 4] = [
    "age-gender-recognition-retail-0013",
    "face-detection-adas-0001",
    "face-detection-retail-0004",
    "mobilenet-ssd",
];

/// Resolution of the device's mono (stereo pair) cameras
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MonoCameraResolution {
    /// 640x400
    #[default]
    #[serde(rename = "THE_400_P")]
    The400P,
    /// 1280x720
    #[serde(rename = "THE_720_P")]
    The720P,
    /// 1280x800
    #[serde(rename = "THE_800_P")]
    The800P,
}

/// Median filter applied to the depth map on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MedianFilter {
    #[serde(rename = "MEDIAN_OFF")]
    Off,
    #[serde(rename = "KERNEL_3x3")]
    Kernel3x3,
    #[serde(rename = "KERNEL_5x5")]
    Kernel5x5,
    #[default]
    #[serde(rename = "KERNEL_7x7")]
    Kernel7x7,
}

/// Capture/inference parameters sent to the remote peer at negotiation time
///
/// Constructed once by the caller and cloned into the negotiation payload.
/// The session only fills in zero camera dimensions (see
/// [`SessionConfig::normalized`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Color camera width in pixels (default: 1920; 0 means default)
    pub cam_width: u32,

    /// Color camera height in pixels (default: 1080; 0 means default)
    pub cam_height: u32,

    /// Neural network model to run on the device (None = no inference)
    #[serde(with = "empty_as_none")]
    pub nn_model: Option<String>,

    /// Mono camera resolution (default: THE_400_P)
    pub mono_camera_resolution: MonoCameraResolution,

    /// Depth median filter (default: KERNEL_7x7)
    pub median_filter: MedianFilter,

    /// Subpixel disparity, serialized as `"on"` / `""`
    #[serde(with = "on_marker")]
    pub subpixel: bool,

    /// Extended disparity range, serialized as `"on"` / `""`
    #[serde(with = "on_marker")]
    pub extended_disparity: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cam_width: DEFAULT_CAM_WIDTH,
            cam_height: DEFAULT_CAM_HEIGHT,
            nn_model: None,
            mono_camera_resolution: MonoCameraResolution::default(),
            median_filter: MedianFilter::default(),
            subpixel: false,
            extended_disparity: false,
        }
    }
}

impl SessionConfig {
    /// Set the color camera resolution; a zero dimension keeps its default
    pub fn with_camera_resolution(mut self, width: u32, height: u32) -> Self {
        self.cam_width = width;
        self.cam_height = height;
        self.normalized()
    }

    /// Replace zero camera dimensions with the defaults, as the device's
    /// own options form does
    pub fn normalized(mut self) -> Self {
        if self.cam_width == 0 {
            self.cam_width = DEFAULT_CAM_WIDTH;
        }
        if self.cam_height == 0 {
            self.cam_height = DEFAULT_CAM_HEIGHT;
        }
        self
    }

    /// Run a neural network model on the device
    pub fn with_nn_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.nn_model = if model.is_empty() { None } else { Some(model) };
        self
    }

    pub fn with_mono_camera_resolution(mut self, resolution: MonoCameraResolution) -> Self {
        self.mono_camera_resolution = resolution;
        self
    }

    pub fn with_median_filter(mut self, filter: MedianFilter) -> Self {
        self.median_filter = filter;
        self
    }

    pub fn with_subpixel(mut self, enabled: bool) -> Self {
        self.subpixel = enabled;
        self
    }

    pub fn with_extended_disparity(mut self, enabled: bool) -> Self {
        self.extended_disparity = enabled;
        self
    }

    /// Validate configuration parameters
    ///
    /// Zero camera dimensions are accepted and mean "default" (see
    /// [`SessionConfig::normalized`]). Unknown model identifiers are passed
    /// through with a warning; the server decides.
    pub fn validate(&self) -> Result<()> {
        if let Some(model) = &self.nn_model {
            if !KNOWN_NN_MODELS.contains(&model.as_str()) {
                warn!("Unknown neural network model '{}', passing through", model);
            }
        }

        Ok(())
    }
}

/// Boolean flags travel as `"on"` (set) or `""` (unset)
mod on_marker {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Marker {
        Flag(bool),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "on" } else { "" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
        Ok(match Option::<Marker>::deserialize(deserializer)? {
            None => false,
            Some(Marker::Flag(flag)) => flag,
            Some(Marker::Text(text)) => !text.is_empty(),
        })
    }
}

/// Optional strings travel as `""` when absent
mod empty_as_none {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<String>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Option<String>, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
    }
}

/// STUN/TURN server entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    /// Server URLs (stun:, turn: or turns:)
    pub urls: Vec<String>,

    /// Username for TURN authentication
    #[serde(default)]
    pub username: Option<String>,

    /// Credential for TURN authentication
    #[serde(default)]
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// How recorded packets are packaged into an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    /// Follow the track codec: IVF for VP8/VP9, Annex-B for H.264,
    /// raw for anything else
    #[default]
    Auto,
    /// Chunks concatenated as received
    Raw,
}

/// Where and how finalized recordings are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Directory artifacts are written to (default: current directory)
    pub output_dir: PathBuf,

    /// Container selection (default: auto)
    pub container: ContainerFormat,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            container: ContainerFormat::default(),
        }
    }
}

/// Local client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the device server; the offer goes to `{signaling_url}/offer`
    pub signaling_url: String,

    /// ICE servers (default: none, host candidates only)
    pub ice_servers: Vec<IceServerConfig>,

    /// Timeout for the offer/answer HTTP request in seconds (default: 30)
    pub request_timeout_secs: u64,

    /// Label of the control data channel (default: pingChannel)
    pub control_channel_label: String,

    /// Delay between sending STREAM_CLOSED and tearing down, in milliseconds
    pub teardown_grace_ms: u64,

    /// Artifact output settings
    pub recording: RecordingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            signaling_url: "http://localhost:8081".to_string(),
            ice_servers: Vec::new(),
            request_timeout_secs: 30,
            control_channel_label: "pingChannel".to_string(),
            teardown_grace_ms: 100,
            recording: RecordingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration pointing at the given device server
    pub fn new(signaling_url: impl Into<String>) -> Self {
        Self {
            signaling_url: signaling_url.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file; missing keys take defaults
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("Loaded client configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_ice_server(mut self, server: IceServerConfig) -> Self {
        self.ice_servers.push(server);
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recording.output_dir = dir.into();
        self
    }

    pub fn with_teardown_grace(mut self, grace: Duration) -> Self {
        self.teardown_grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.teardown_grace_ms)
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - signaling_url is not http:// or https://
    /// - an ICE server URL has an unsupported scheme
    /// - request_timeout_secs is zero
    /// - the control channel label is empty
    pub fn validate(&self) -> Result<()> {
        if !self.signaling_url.starts_with("http://") && !self.signaling_url.starts_with("https://")
        {
            return Err(Error::InvalidConfig(format!(
                "signaling_url must start with http:// or https://, got: {}",
                self.signaling_url
            )));
        }

        for server in &self.ice_servers {
            if server.urls.is_empty() {
                return Err(Error::InvalidConfig(
                    "ICE server entry has no URLs".to_string(),
                ));
            }
            for url in &server.urls {
                if !(url.starts_with("stun:") || url.starts_with("turn:") || url.starts_with("turns:"))
                {
                    return Err(Error::InvalidConfig(format!(
                        "ICE server URL must use stun:, turn: or turns:, got: {}",
                        url
                    )));
                }
            }
        }

        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.control_channel_label.is_empty() {
            return Err(Error::InvalidConfig(
                "control_channel_label must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
