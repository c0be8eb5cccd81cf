//! Recording pipeline: per-role recorders and artifact delivery

pub mod artifact;
pub mod container;
pub mod recorder;

pub use artifact::{Artifact, ArtifactSink, DownloadDirSink, MemorySink};
pub use container::Container;
pub use recorder::{RecorderState, StreamRecorder};
