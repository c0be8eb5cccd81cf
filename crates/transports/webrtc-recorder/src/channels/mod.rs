//! Control data channel
//!
//! One ordered, reliable channel per session (label `pingChannel` unless
//! configured otherwise). The client sends `{"type":"STREAM_CLOSED"}` right
//! before tearing down; whatever the server sends is parsed as JSON and
//! handed to the caller.

mod data_channel;
mod messages;

pub use data_channel::{
    CloseHandler, ControlChannel, DataChannelHandle, DataChannelState, MessageHandler,
    OpenHandler,
};
pub use messages::{ChannelMessage, ControlMessage};
