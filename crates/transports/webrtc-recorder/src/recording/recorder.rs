//! Per-role stream recorder
//!
//! A recorder buffers the encoded chunks of one video track and turns them
//! into a single [`Artifact`] when stopped. Chunks are read by a pump task
//! and handed back through a callback so the session can serialize them
//! with every other event.

use super::artifact::Artifact;
use super::container::Container;
use crate::config::{ContainerFormat, RecordingConfig};
use crate::media::{MediaStream, Role};
use crate::{Error, Result};
use bytes::Bytes;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Recorder lifecycle; `Stopped` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Stopped,
}

pub struct StreamRecorder {
    role: Role,
    format: ContainerFormat,
    container: Container,
    state: RecorderState,
    chunks: Vec<Bytes>,
    pump: Option<JoinHandle<()>>,
    halt: Option<watch::Sender<bool>>,
}

impl StreamRecorder {
    pub fn new(role: Role, recording: &RecordingConfig) -> Self {
        Self {
            role,
            format: recording.container,
            container: Container::Raw,
            state: RecorderState::Idle,
            chunks: Vec::new(),
            pump: None,
            halt: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Container the artifact will be written in; fixed at `start`
    pub fn container(&self) -> Container {
        self.container
    }

    /// Number of chunks buffered so far
    pub fn buffered_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Start recording `stream`.
    ///
    /// Spawns a pump that reads the stream's video track and calls
    /// `on_chunk` for every chunk, in order. Must be called inside a tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// `Error::RecorderInitError` if the stream has no video track or the
    /// track cannot be read. `Error::InvalidState` if already started.
    pub fn start<F>(&mut self, stream: &MediaStream, on_chunk: F) -> Result<()>
    where
        F: Fn(Bytes) + Send + Sync + 'static,
    {
        if self.state != RecorderState::Idle {
            return Err(Error::InvalidState(format!(
                "{} recorder already {:?}",
                self.role, self.state
            )));
        }

        let track = stream.video_track().ok_or_else(|| {
            Error::RecorderInitError(format!("stream {} has no video track", stream.id()))
        })?;

        let source = track.source().cloned().ok_or_else(|| {
            Error::RecorderInitError(format!("track {} has no readable media", track.id()))
        })?;

        self.container = Container::select(self.format, track.codec());

        let (halt_tx, mut halt_rx) = watch::channel(false);
        let role = self.role;
        let track_id = track.id().to_string();
        self.pump = Some(tokio::spawn(async move {
            loop {
                // Chunks already readable win over the halt signal
                tokio::select! {
                    biased;
                    chunk = source.next_chunk() => match chunk {
                        Some(chunk) => on_chunk(chunk),
                        None => break,
                    },
                    _ = halt_rx.wait_for(|halted| *halted) => {
                        debug!("{} pump for track {} halted", role, track_id);
                        return;
                    }
                }
            }
            debug!("{} pump for track {} finished", role, track_id);
        }));
        self.halt = Some(halt_tx);

        self.state = RecorderState::Recording;
        info!(
            "Recording {} stream {} as {}",
            self.role,
            stream.id(),
            self.container.mime_type()
        );
        Ok(())
    }

    /// Ask the pump to stop reading once it has forwarded every chunk that
    /// is already available.
    ///
    /// The recorder keeps accepting chunks; await the returned handle, then
    /// deliver whatever the pump forwarded before calling [`stop`](Self::stop).
    pub fn halt_pump(&mut self) -> Option<JoinHandle<()>> {
        if let Some(halt) = self.halt.take() {
            let _ = halt.send(true);
        }
        self.pump.take()
    }

    /// Append a chunk.
    ///
    /// Returns `false` when the chunk was discarded: zero-size, or the
    /// recorder is not recording.
    pub fn on_chunk(&mut self, data: Bytes) -> bool {
        if self.state != RecorderState::Recording || data.is_empty() {
            return false;
        }
        self.chunks.push(data);
        true
    }

    /// Stop recording and finalize.
    ///
    /// Returns the artifact the first time a recording recorder is stopped;
    /// `None` on every later call and for a recorder that never started.
    pub fn stop(&mut self) -> Option<Artifact> {
        self.halt = None;
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }

        let previous = std::mem::replace(&mut self.state, RecorderState::Stopped);
        if previous != RecorderState::Recording {
            return None;
        }

        let chunks = std::mem::take(&mut self.chunks);
        let total: usize = chunks.iter().map(Bytes::len).sum();
        let (container, data) = match self.container.package(&chunks) {
            Ok(data) => (self.container, data),
            Err(e) => {
                error!("{} recording falls back to raw chunks: {}", self.role, e);
                let raw = Container::Raw.package(&chunks).unwrap_or_default();
                (Container::Raw, raw)
            }
        };

        let artifact = Artifact::new(
            self.role,
            container.mime_type(),
            container.extension(),
            data,
        );
        info!(
            "Finalized {} recording: {} chunks, {} bytes received, {} bytes written",
            self.role,
            chunks.len(),
            total,
            artifact.len()
        );
        Some(artifact)
    }
}

impl Drop for StreamRecorder {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}
