//! Control messages carried on the data channel
//!
//! Every payload is a JSON object with a `type` field.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Messages this client sends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// The client is about to tear the session down
    #[serde(rename = "STREAM_CLOSED")]
    StreamClosed,
}

impl ControlMessage {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A message received from the server
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    /// Value of the `type` field, when present and a string
    pub message_type: Option<String>,
    /// The whole parsed payload
    pub payload: serde_json::Value,
}

impl ChannelMessage {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::DataChannelError(format!("Message is not UTF-8: {}", e)))?;
        let payload: serde_json::Value = serde_json::from_str(text)?;
        let message_type = payload
            .get("type")
            .and_then(|t| t.as_str())
            .map(str::to_string);
        Ok(Self {
            message_type,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_closed_json() {
        assert_eq!(
            ControlMessage::StreamClosed.to_json().unwrap(),
            r#"{"type":"STREAM_CLOSED"}"#
        );
    }

    #[test]
    fn test_parse_incoming() {
        let msg = ChannelMessage::from_bytes(br#"{"type":"PONG","seq":3}"#).unwrap();
        assert_eq!(msg.message_type.as_deref(), Some("PONG"));
        assert_eq!(msg.payload["seq"], 3);

        let untyped = ChannelMessage::from_bytes(b"[1,2]").unwrap();
        assert_eq!(untyped.message_type, None);

        assert!(ChannelMessage::from_bytes(b"not json").is_err());
        assert!(ChannelMessage::from_bytes(&[0xff, 0xfe]).is_err());
    }
}
