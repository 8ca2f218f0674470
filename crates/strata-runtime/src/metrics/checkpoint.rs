//! Metrics checkpoint persistence.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{MetricsSnapshot, TRACING_TARGET};
use crate::error::Result;

/// File name of the metrics checkpoint inside a checkpoint directory.
pub const CHECKPOINT_FILE_NAME: &str = "metrics.checkpoint.json";

/// Reads and writes the metrics checkpoint of a streaming job.
///
/// Writes go to a temporary file that is renamed over the checkpoint, so a
/// reader never observes a partially written snapshot.
#[derive(Debug, Clone)]
pub struct MetricsCheckpoint {
    path: PathBuf,
}

impl MetricsCheckpoint {
    /// Creates a checkpoint stored in the given directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(CHECKPOINT_FILE_NAME),
        }
    }

    /// Returns the checkpoint file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the checkpointed snapshot, if one exists.
    pub fn load(&self) -> Result<Option<MetricsSnapshot>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot: MetricsSnapshot = serde_json::from_slice(&bytes)?;
        tracing::debug!(
            target: TRACING_TARGET,
            path = %self.path.display(),
            metrics = snapshot.len(),
            "Loaded metrics checkpoint"
        );
        Ok(Some(snapshot))
    }

    /// Persists a snapshot, creating the directory if needed.
    pub fn store(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_vec(snapshot)?)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}
