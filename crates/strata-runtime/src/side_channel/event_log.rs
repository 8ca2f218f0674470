//! Event log recorder.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use url::Url;

use super::TRACING_TARGET;
use crate::error::{Error, Result};

/// Suffix of an event log that is still being written.
pub const IN_PROGRESS_SUFFIX: &str = ".inprogress";

/// A job lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    /// The driver executor joined.
    ExecutorAdded {
        timestamp: Timestamp,
        executor_id: String,
        master: String,
    },
    /// The job was submitted.
    ApplicationStart {
        timestamp: Timestamp,
        app_name: String,
        app_id: String,
        user: String,
    },
    /// The job reached a terminal state.
    ApplicationEnd {
        timestamp: Timestamp,
        status: String,
        metrics: BTreeMap<String, String>,
    },
}

/// Writes job lifecycle events as JSON lines.
///
/// Events go to `<dir>/<job id>.inprogress`; [`close`] renames the file to
/// `<dir>/<job id>`.
///
/// [`close`]: EventLogRecorder::close
#[derive(Debug)]
pub struct EventLogRecorder {
    in_progress: PathBuf,
    target: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl EventLogRecorder {
    /// Resolves a configured event log directory.
    ///
    /// Accepts plain paths and `file://` URIs. Returns `None` (after logging
    /// a warning) for malformed URIs and other schemes.
    pub fn resolve_dir(raw: &str) -> Option<PathBuf> {
        if !raw.contains("://") {
            return Some(PathBuf::from(raw));
        }

        match Url::parse(raw) {
            Ok(url) if url.scheme() == "file" => match url.to_file_path() {
                Ok(path) => Some(path),
                Err(()) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        uri = raw,
                        "Event log URI has no local path, event logging disabled"
                    );
                    None
                }
            },
            Ok(url) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    uri = raw,
                    scheme = url.scheme(),
                    "Unsupported event log scheme, event logging disabled"
                );
                None
            }
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    uri = raw,
                    error = %error,
                    "Malformed event log URI, event logging disabled"
                );
                None
            }
        }
    }

    /// Opens a recorder for a job in an existing directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventLogUnavailable`] if the directory does not exist
    /// or the log file cannot be created.
    pub fn create(dir: &Path, job_id: &str) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::EventLogUnavailable {
                path: dir.to_path_buf(),
            });
        }

        let file_name = job_id.replace(['/', '\\'], "_");
        let target = dir.join(&file_name);
        let in_progress = dir.join(format!("{file_name}{IN_PROGRESS_SUFFIX}"));
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&in_progress)
            .map_err(|_| Error::EventLogUnavailable {
                path: dir.to_path_buf(),
            })?;

        tracing::debug!(
            target: TRACING_TARGET,
            path = %in_progress.display(),
            "Event log opened"
        );

        Ok(Self {
            in_progress,
            target,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Appends an event.
    pub fn record(&self, event: &LogEvent) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *writer, event)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Flushes the log and moves it to its final name.
    pub fn close(self) -> Result<PathBuf> {
        let mut writer = self
            .writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        writer.flush()?;
        drop(writer);

        fs::rename(&self.in_progress, &self.target)?;
        tracing::debug!(
            target: TRACING_TARGET,
            path = %self.target.display(),
            "Event log closed"
        );
        Ok(self.target)
    }
}
