//! Streaming listeners owned by the runner.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use jiff::Timestamp;

use super::{TRACING_TARGET, WatermarkTable};
use crate::engine::{BatchInfo, StreamingListener};
use crate::metrics::{MetricsAccumulator, MetricsCheckpoint};

/// Makes queued watermark updates visible after every batch.
#[derive(Debug, Clone)]
pub struct WatermarkAdvancingListener {
    watermarks: WatermarkTable,
}

impl WatermarkAdvancingListener {
    /// Name reported to the streaming context.
    pub const NAME: &'static str = "watermark-advancer";

    /// Creates a listener advancing the given table.
    pub fn new(watermarks: WatermarkTable) -> Self {
        Self { watermarks }
    }
}

impl StreamingListener for WatermarkAdvancingListener {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_batch_completed(&self, batch: &BatchInfo) {
        let advanced = self.watermarks.advance();
        tracing::trace!(
            target: TRACING_TARGET,
            batch_time = %batch.batch_time,
            advanced,
            "Advanced watermarks"
        );
    }
}

/// Persists the metrics accumulator after every batch.
#[derive(Debug, Clone)]
pub struct CheckpointingListener {
    metrics: MetricsAccumulator,
    checkpoint: MetricsCheckpoint,
    issued: Arc<AtomicU64>,
    written: Arc<Mutex<u64>>,
}

impl CheckpointingListener {
    /// Name reported to the streaming context.
    pub const NAME: &'static str = "metrics-checkpoint";

    /// Creates a listener checkpointing `metrics` to `checkpoint`.
    pub fn new(metrics: MetricsAccumulator, checkpoint: MetricsCheckpoint) -> Self {
        Self {
            metrics,
            checkpoint,
            issued: Arc::default(),
            written: Arc::default(),
        }
    }

    fn store(&self) {
        let snapshot = self.metrics.snapshot();
        let sequence = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let checkpoint = self.checkpoint.clone();
        let written = Arc::clone(&self.written);
        let write = move || {
            let mut latest = written.lock().unwrap_or_else(PoisonError::into_inner);
            // A newer snapshot already reached the disk.
            if *latest >= sequence {
                return;
            }
            *latest = sequence;
            if let Err(error) = checkpoint.store(&snapshot) {
                tracing::warn!(
                    target: TRACING_TARGET,
                    path = %checkpoint.path().display(),
                    error = %error,
                    "Failed to checkpoint metrics"
                );
            }
        };

        // Callbacks must not block the engine's dispatch path.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(write);
            }
            Err(_) => write(),
        }
    }
}

impl StreamingListener for CheckpointingListener {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_streaming_started(&self, _time: Timestamp) {
        self.store();
    }

    fn on_batch_completed(&self, _batch: &BatchInfo) {
        self.store();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::metrics::MetricKey;

    fn batch() -> BatchInfo {
        BatchInfo {
            batch_time: Timestamp::now(),
            num_records: 1,
            processing_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn advancer_publishes_pending_watermarks() {
        let table = WatermarkTable::new();
        let listener = WatermarkAdvancingListener::new(table.clone());
        table
            .add("stage-0", Timestamp::UNIX_EPOCH, Timestamp::now())
            .unwrap();

        listener.on_batch_completed(&batch());
        assert!(table.get("stage-0").is_some());
    }

    #[test]
    fn checkpointing_writes_without_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = MetricsAccumulator::new();
        metrics.inc_counter(MetricKey::new("io", "records"), 2);
        let checkpoint = MetricsCheckpoint::in_dir(dir.path());
        let listener = CheckpointingListener::new(metrics.clone(), checkpoint.clone());

        listener.on_batch_completed(&batch());
        assert_eq!(checkpoint.load().unwrap(), Some(metrics.snapshot()));
    }
}
