//! Handle to a submitted job.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OnceCell, watch};
use tokio_util::sync::CancellationToken;

use super::worker::{Outcome, WorkerHandle};
use super::{JobState, TRACING_TARGET, TerminalStatus};
use crate::engine::StreamingContext;
use crate::error::{Error, Result};
use crate::job::JobInfo;
use crate::metrics::{MetricsAccumulator, MetricsSnapshot};
use crate::mode::ExecutionMode;
use crate::side_channel::WatermarkTable;

/// Externally observable handle to a submitted job.
///
/// The job runs on its own worker; this handle only observes it. Waiting
/// is idempotent: the first completed wait memoizes the outcome and every
/// later call returns the same result.
pub struct PipelineResult {
    job: JobInfo,
    mode: ExecutionMode,
    metrics: MetricsAccumulator,
    watermarks: WatermarkTable,
    streaming: Option<Arc<dyn StreamingContext>>,
    state: watch::Receiver<JobState>,
    cancel: CancellationToken,
    worker: Mutex<WorkerHandle>,
    outcome: OnceCell<Outcome>,
}

/// Parts of a job shared with its result handle.
pub(crate) struct ResultParts {
    pub job: JobInfo,
    pub mode: ExecutionMode,
    pub metrics: MetricsAccumulator,
    pub watermarks: WatermarkTable,
    pub streaming: Option<Arc<dyn StreamingContext>>,
    pub state: watch::Receiver<JobState>,
    pub cancel: CancellationToken,
}

impl PipelineResult {
    pub(crate) fn new(parts: ResultParts, worker: WorkerHandle) -> Self {
        Self {
            job: parts.job,
            mode: parts.mode,
            metrics: parts.metrics,
            watermarks: parts.watermarks,
            streaming: parts.streaming,
            state: parts.state,
            cancel: parts.cancel,
            worker: Mutex::new(worker),
            outcome: OnceCell::new(),
        }
    }

    /// Waits until the job reaches a terminal state and its side channels
    /// are finalized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobFailed`] wrapping the original error if
    /// translation or execution failed.
    pub async fn wait_until_finish(&self) -> Result<TerminalStatus> {
        let outcome = self
            .outcome
            .get_or_init(|| async { self.worker.lock().await.join().await })
            .await;

        outcome
            .clone()
            .map_err(|source| Error::job_failed(&self.job, source))
    }

    /// Waits up to `timeout`; returns `None` if the job is still running.
    pub async fn wait_until_finish_timeout(
        &self,
        timeout: Duration,
    ) -> Option<Result<TerminalStatus>> {
        tokio::time::timeout(timeout, self.wait_until_finish())
            .await
            .ok()
    }

    /// Returns a snapshot of the job's metrics without blocking.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    /// Returns the job identity.
    pub fn job(&self) -> &JobInfo {
        &self.job
    }

    /// Returns the execution mode.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Returns the job's watermark table.
    pub fn watermarks(&self) -> &WatermarkTable {
        &self.watermarks
    }

    /// Returns the streaming context of a streaming job.
    pub fn streaming_context(&self) -> Option<&Arc<dyn StreamingContext>> {
        self.streaming.as_ref()
    }

    /// Requests a graceful stop of a streaming job.
    ///
    /// The job finishes with [`TerminalStatus::StoppedOnInterrupt`]. Has no
    /// effect on batch jobs or jobs that already finished.
    pub fn cancel(&self) {
        if !self.mode.is_streaming() {
            tracing::debug!(
                target: TRACING_TARGET,
                job_id = %self.job.job_id(),
                "Ignoring cancel request for batch job"
            );
            return;
        }

        tracing::info!(
            target: TRACING_TARGET,
            job_id = %self.job.job_id(),
            "Cancel requested"
        );
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for PipelineResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineResult")
            .field("job_id", &self.job.job_id())
            .field("mode", &self.mode)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
