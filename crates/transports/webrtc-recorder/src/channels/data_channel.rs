//! Control data channel handle
//!
//! Wraps the transport's channel with a `Connecting -> Open -> Closed`
//! lifecycle and the caller's open/close/message callbacks. Lifecycle
//! notifications arrive through the session's event queue.

use super::messages::{ChannelMessage, ControlMessage};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Data channel state; a closed channel is never reopened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataChannelState {
    Connecting,
    Open,
    Closed,
}

/// Transport side of an ordered, reliable data channel
#[async_trait]
pub trait ControlChannel: Send + Sync {
    fn label(&self) -> &str;

    async fn send_text(&self, text: String) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

pub type OpenHandler = Box<dyn Fn() + Send + Sync>;
pub type CloseHandler = Box<dyn Fn() + Send + Sync>;
pub type MessageHandler = Box<dyn Fn(ChannelMessage) + Send + Sync>;

struct HandleInner {
    channel: Arc<dyn ControlChannel>,
    state: Mutex<DataChannelState>,
    on_open: OpenHandler,
    on_close: CloseHandler,
    on_message: MessageHandler,
}

/// Caller-facing handle to the session's control channel
#[derive(Clone)]
pub struct DataChannelHandle {
    inner: Arc<HandleInner>,
}

impl std::fmt::Debug for DataChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataChannelHandle")
            .field("label", &self.inner.channel.label())
            .field("state", &*self.inner.state.lock())
            .finish_non_exhaustive()
    }
}

impl DataChannelHandle {
    pub fn new(
        channel: Arc<dyn ControlChannel>,
        on_open: OpenHandler,
        on_close: CloseHandler,
        on_message: MessageHandler,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                channel,
                state: Mutex::new(DataChannelState::Connecting),
                on_open,
                on_close,
                on_message,
            }),
        }
    }

    pub fn label(&self) -> &str {
        self.inner.channel.label()
    }

    pub fn state(&self) -> DataChannelState {
        *self.inner.state.lock()
    }

    pub fn is_open(&self) -> bool {
        self.state() == DataChannelState::Open
    }

    /// Send a control message.
    ///
    /// # Errors
    ///
    /// `Error::DataChannelError` if the channel is not open or the send fails.
    pub async fn send(&self, message: &ControlMessage) -> Result<()> {
        let state = self.state();
        if state != DataChannelState::Open {
            return Err(Error::DataChannelError(format!(
                "Data channel '{}' is not open (state: {:?})",
                self.label(),
                state
            )));
        }

        let text = message.to_json()?;
        debug!("Sending on '{}': {}", self.label(), text);
        self.inner.channel.send_text(text).await
    }

    /// Close the channel. Safe to call more than once.
    pub async fn close(&self) -> Result<()> {
        if self.state() == DataChannelState::Closed {
            return Ok(());
        }
        self.inner.channel.close().await?;
        self.handle_close();
        Ok(())
    }

    pub(crate) fn handle_open(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state != DataChannelState::Connecting {
                return;
            }
            *state = DataChannelState::Open;
        }
        debug!("Data channel '{}' opened", self.label());
        (self.inner.on_open)();
    }

    pub(crate) fn handle_close(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state == DataChannelState::Closed {
                return;
            }
            *state = DataChannelState::Closed;
        }
        debug!("Data channel '{}' closed", self.label());
        (self.inner.on_close)();
    }

    pub(crate) fn handle_message(&self, data: &[u8]) {
        match ChannelMessage::from_bytes(data) {
            Ok(message) => (self.inner.on_message)(message),
            Err(e) => warn!(
                "Dropping unparsable message on '{}': {}",
                self.label(),
                e
            ),
        }
    }
}
