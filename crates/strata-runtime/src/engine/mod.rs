//! Engine collaborator traits.
//!
//! The runner never executes transforms itself. It drives an [`Engine`]
//! through these traits: batch jobs force datasets directly, streaming jobs
//! go through a [`StreamingContext`] that reports progress to registered
//! [`StreamingListener`]s.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::translation::Dataset;

/// Typed facts about the engine a job runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineInfo {
    /// Master URL or scheduler address.
    pub master: String,
    /// Id of the executor that runs the driver.
    pub executor_id: String,
    /// User the engine runs as.
    pub user: String,
}

/// Handle to the underlying processing engine.
pub trait Engine: Send + Sync + 'static {
    /// Returns facts about the engine.
    fn info(&self) -> EngineInfo;

    /// Creates a streaming context with the given batch interval.
    fn create_streaming_context(&self, batch_interval: Duration)
    -> Result<Arc<dyn StreamingContext>>;
}

/// Engine-side state of a streaming job.
///
/// Implementations must tolerate `stop` being called before `start` and
/// being called more than once.
#[async_trait]
pub trait StreamingContext: Send + Sync {
    /// Registers a listener; listeners are notified in registration order.
    fn add_listener(&self, listener: Arc<dyn StreamingListener>);

    /// Binds the context to a checkpoint location.
    fn checkpoint(&self, dir: &str);

    /// Registers a dataset to be forced on every batch.
    fn register_output(&self, output: Arc<dyn Dataset>) -> Result<()>;

    /// Starts processing batches.
    fn start(&self) -> Result<()>;

    /// Resolves when the context terminates, either by itself or after a
    /// stop request.
    async fn await_termination(&self) -> Result<()>;

    /// Requests the context to stop.
    fn stop(&self, graceful: bool);
}

/// Progress of a completed streaming batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInfo {
    /// Logical time of the batch.
    pub batch_time: Timestamp,
    /// Number of records processed in the batch.
    pub num_records: u64,
    /// Wall time spent processing the batch.
    pub processing_delay: Duration,
}

/// Observer of streaming progress.
///
/// Callbacks run on the engine's dispatch path and must not block.
pub trait StreamingListener: Send + Sync {
    /// Returns a short name used in logs.
    fn name(&self) -> &str;

    /// Called once when the streaming context starts.
    fn on_streaming_started(&self, _time: Timestamp) {}

    /// Called after every completed batch.
    fn on_batch_completed(&self, batch: &BatchInfo);
}
