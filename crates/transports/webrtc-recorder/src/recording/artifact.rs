//! Finalized recordings and where they go

use crate::media::Role;
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::info;

/// One finalized recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub role: Role,
    /// `<role>-stream-<unix-millis>.<ext>`
    pub file_name: String,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub data: Bytes,
}

impl Artifact {
    pub fn new(role: Role, mime_type: &str, extension: &str, data: Bytes) -> Self {
        let created_at = Utc::now();
        Self {
            role,
            file_name: format!(
                "{}-stream-{}.{}",
                role,
                created_at.timestamp_millis(),
                extension
            ),
            mime_type: mime_type.to_string(),
            created_at,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Receives each artifact exactly once, when its recorder stops
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn deliver(&self, artifact: Artifact) -> Result<()>;
}

/// Writes artifacts into a directory, one file each
pub struct DownloadDirSink {
    dir: PathBuf,
}

impl DownloadDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArtifactSink for DownloadDirSink {
    async fn deliver(&self, artifact: Artifact) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(&artifact.file_name);
        tokio::fs::write(&path, &artifact.data).await?;
        info!(
            role = %artifact.role,
            "Saved {} ({} bytes, {})",
            path.display(),
            artifact.len(),
            artifact.mime_type
        );
        Ok(())
    }
}

/// Keeps artifacts in memory for the embedding application
#[derive(Default)]
pub struct MemorySink {
    artifacts: Mutex<Vec<Artifact>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts.lock().clone()
    }

    pub fn take(&self) -> Vec<Artifact> {
        std::mem::take(&mut *self.artifacts.lock())
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn deliver(&self, artifact: Artifact) -> Result<()> {
        self.artifacts.lock().push(artifact);
        Ok(())
    }
}
