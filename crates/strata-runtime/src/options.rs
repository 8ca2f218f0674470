//! Pipeline options.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default event log directory.
pub const DEFAULT_EVENT_LOG_DIR: &str = "/tmp/spark-events/";

/// Default streaming batch interval in milliseconds.
pub const DEFAULT_BATCH_INTERVAL_MS: u64 = 1000;

/// Destination for the final metrics push.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricsSinkConfig {
    /// Metrics are not pushed anywhere.
    #[default]
    None,
    /// Metrics are emitted as structured log events.
    Log,
    /// Metrics are written as a JSON document to the given path.
    JsonFile {
        /// Output file path.
        path: PathBuf,
    },
}

/// Typed options for a pipeline run.
///
/// Populated once (from the bundled options document, then CLI overrides)
/// and read by every component through named fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(
    default,
    setter(into, strip_option),
    build_fn(validate = "Self::validate")
)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineOptions {
    /// User-facing job name.
    pub job_name: String,
    /// Application name reported to the engine; defaults to the job name.
    pub app_name: Option<String>,
    /// Forces streaming execution even for bounded graphs.
    pub streaming: bool,
    /// Streaming run timeout in milliseconds; unset waits until termination.
    pub streaming_timeout_ms: Option<u64>,
    /// Streaming batch interval in milliseconds.
    pub batch_interval_ms: u64,
    /// Checkpoint location for streaming jobs; defaults to `/tmp/<app name>`.
    pub checkpoint_dir: Option<String>,
    /// Whether the event log recorder is enabled.
    pub event_log_enabled: bool,
    /// Event log directory, as a path or `file://` URI.
    pub event_log_dir: String,
    /// Whether metrics are checkpointed and pushed.
    pub metrics_enabled: bool,
    /// Whether the watermark bridge is registered for streaming jobs.
    pub watermarks_enabled: bool,
    /// Destination of the final metrics push.
    pub metrics_sink: MetricsSinkConfig,
}

impl PipelineOptionsBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.batch_interval_ms == Some(0) {
            return Err("batch_interval_ms must be at least 1".into());
        }
        Ok(())
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            job_name: String::new(),
            app_name: None,
            streaming: false,
            streaming_timeout_ms: None,
            batch_interval_ms: DEFAULT_BATCH_INTERVAL_MS,
            checkpoint_dir: None,
            event_log_enabled: false,
            event_log_dir: DEFAULT_EVENT_LOG_DIR.to_owned(),
            metrics_enabled: true,
            watermarks_enabled: true,
            metrics_sink: MetricsSinkConfig::None,
        }
    }
}

impl PipelineOptions {
    /// Returns a builder for pipeline options.
    pub fn builder() -> PipelineOptionsBuilder {
        PipelineOptionsBuilder::default()
    }

    /// Returns the application name, falling back to the job name.
    pub fn app_name(&self) -> &str {
        self.app_name.as_deref().unwrap_or(&self.job_name)
    }

    /// Returns the streaming timeout, if one is configured.
    #[inline]
    pub fn streaming_timeout(&self) -> Option<Duration> {
        self.streaming_timeout_ms.map(Duration::from_millis)
    }

    /// Returns the streaming batch interval.
    #[inline]
    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    /// Returns the checkpoint location for streaming jobs.
    pub fn checkpoint_dir(&self) -> String {
        match &self.checkpoint_dir {
            Some(dir) => dir.clone(),
            None => format!("/tmp/{}", self.app_name()),
        }
    }

    /// Validates the options.
    pub fn validate(&self) -> Result<()> {
        if self.batch_interval_ms == 0 {
            return Err(Error::invalid_config("batch interval cannot be zero"));
        }
        if self.event_log_enabled && self.event_log_dir.trim().is_empty() {
            return Err(Error::invalid_config(
                "event log is enabled but no event log directory is set",
            ));
        }
        Ok(())
    }
}
