//! Metrics sinks.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{MetricsSnapshot, TRACING_TARGET};
use crate::error::Result;
use crate::job::JobInfo;
use crate::options::MetricsSinkConfig;

/// Destination for a job's final metrics.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Returns a short name used in logs.
    fn name(&self) -> &str;

    /// Writes a snapshot of the job's metrics.
    async fn write_metrics(&self, job: &JobInfo, snapshot: &MetricsSnapshot) -> Result<()>;
}

/// Emits every rendered metric as a structured log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMetricsSink;

#[async_trait]
impl MetricsSink for LogMetricsSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn write_metrics(&self, job: &JobInfo, snapshot: &MetricsSnapshot) -> Result<()> {
        for (name, value) in snapshot.render() {
            tracing::info!(
                target: TRACING_TARGET,
                job_id = %job.job_id(),
                metric = %name,
                value = %value,
                "Metric"
            );
        }
        Ok(())
    }
}

/// Writes the snapshot as a JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileMetricsSink {
    path: PathBuf,
}

impl JsonFileMetricsSink {
    /// Creates a sink writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MetricsSink for JsonFileMetricsSink {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn write_metrics(&self, job: &JobInfo, snapshot: &MetricsSnapshot) -> Result<()> {
        let document = json!({
            "jobId": job.job_id(),
            "jobName": job.job_name(),
            "metrics": snapshot,
            "rendered": snapshot.render(),
        });

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(&document)?).await?;
        Ok(())
    }
}

/// Forwards the final snapshot to the configured sink.
///
/// Push failures are logged and never fail the job.
#[derive(Clone, Default)]
pub struct MetricsPusher {
    sink: Option<Arc<dyn MetricsSink>>,
}

impl MetricsPusher {
    /// Creates a pusher for a sink.
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Creates a pusher from configuration.
    pub fn from_config(config: &MetricsSinkConfig) -> Self {
        match config {
            MetricsSinkConfig::None => Self::default(),
            MetricsSinkConfig::Log => Self::new(Arc::new(LogMetricsSink)),
            MetricsSinkConfig::JsonFile { path } => {
                Self::new(Arc::new(JsonFileMetricsSink::new(path.clone())))
            }
        }
    }

    /// Returns true if a sink is configured.
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Pushes a snapshot; returns false if the sink failed.
    pub async fn push(&self, job: &JobInfo, snapshot: &MetricsSnapshot) -> bool {
        let Some(sink) = &self.sink else {
            return true;
        };

        match sink.write_metrics(job, snapshot).await {
            Ok(()) => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    sink = sink.name(),
                    metrics = snapshot.len(),
                    "Pushed metrics"
                );
                true
            }
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    sink = sink.name(),
                    job_id = %job.job_id(),
                    error = %error,
                    "Failed to push metrics"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for MetricsPusher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsPusher")
            .field("sink", &self.sink.as_ref().map(|sink| sink.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricKey, MetricsAccumulator};

    fn job() -> JobInfo {
        JobInfo::new("wordcount_1", "wordcount", "token", serde_json::Value::Null)
    }

    #[tokio::test]
    async fn json_file_sink_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/metrics.json");
        let pusher =
            MetricsPusher::from_config(&MetricsSinkConfig::JsonFile { path: path.clone() });

        let accumulator = MetricsAccumulator::new();
        accumulator.inc_counter(MetricKey::new("io", "records"), 5);
        assert!(pusher.push(&job(), &accumulator.snapshot()).await);

        let document: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(document["jobId"], "wordcount_1");
        assert_eq!(document["rendered"]["io.records"], "5");
    }

    #[tokio::test]
    async fn failures_are_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let pusher = MetricsPusher::new(Arc::new(JsonFileMetricsSink::new(dir.path())));

        assert!(!pusher.push(&job(), &MetricsSnapshot::default()).await);
    }

    #[tokio::test]
    async fn disabled_pusher_is_a_no_op() {
        let pusher = MetricsPusher::from_config(&MetricsSinkConfig::None);
        assert!(!pusher.is_enabled());
        assert!(pusher.push(&job(), &MetricsSnapshot::default()).await);
    }
}
