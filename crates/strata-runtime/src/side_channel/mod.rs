//! Job-scoped side channels.
//!
//! [`SideChannels`] ties the metrics accumulator, the watermark bridge and
//! the optional event log to one job. They are initialized before
//! submission, attached to the streaming context in a fixed order, and
//! finalized on the job's worker once it reaches a terminal state.

mod event_log;
mod listener;
mod watermark;

use std::sync::Arc;

use jiff::Timestamp;

pub use event_log::{EventLogRecorder, IN_PROGRESS_SUFFIX, LogEvent};
pub use listener::{CheckpointingListener, WatermarkAdvancingListener};
pub use watermark::{WatermarkTable, Watermarks};

use crate::engine::{EngineInfo, StreamingContext, StreamingListener};
use crate::error::Result;
use crate::job::JobInfo;
use crate::metrics::{MetricsAccumulator, MetricsCheckpoint, MetricsPusher};
use crate::mode::ExecutionMode;
use crate::options::PipelineOptions;
use crate::translation::TranslationContext;

/// Tracing target for side channel operations.
pub const TRACING_TARGET: &str = "strata_runtime::side_channel";

/// Side channels of a single job.
#[derive(Debug)]
pub struct SideChannels {
    job: JobInfo,
    app_name: String,
    engine: EngineInfo,
    mode: ExecutionMode,
    metrics: MetricsAccumulator,
    watermarks: WatermarkTable,
    checkpoint: Option<MetricsCheckpoint>,
    watermarks_enabled: bool,
    pusher: MetricsPusher,
    event_log: Option<EventLogRecorder>,
}

impl SideChannels {
    /// Initializes the side channels of the job owning `ctx`.
    ///
    /// In streaming mode with metrics enabled, the accumulator is recovered
    /// from the checkpoint directory if a checkpoint exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventLogUnavailable`] if event logging is enabled and
    /// the directory does not exist or is not writable.
    ///
    /// [`Error::EventLogUnavailable`]: crate::Error::EventLogUnavailable
    pub fn init(options: &PipelineOptions, ctx: &TranslationContext) -> Result<Self> {
        let job = ctx.job().clone();
        let mode = ctx.mode();

        let event_log = if options.event_log_enabled {
            EventLogRecorder::resolve_dir(&options.event_log_dir)
                .map(|dir| EventLogRecorder::create(&dir, job.job_id()))
                .transpose()?
        } else {
            None
        };

        let checkpoint = (mode.is_streaming() && options.metrics_enabled)
            .then(|| MetricsCheckpoint::in_dir(options.checkpoint_dir()));
        if let Some(checkpoint) = &checkpoint {
            match checkpoint.load() {
                Ok(Some(snapshot)) => {
                    tracing::info!(
                        target: TRACING_TARGET,
                        job_id = %job.job_id(),
                        metrics = snapshot.len(),
                        "Recovered metrics from checkpoint"
                    );
                    ctx.metrics().merge(&snapshot);
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        path = %checkpoint.path().display(),
                        error = %error,
                        "Ignoring unreadable metrics checkpoint"
                    );
                }
            }
        }

        let pusher = if options.metrics_enabled {
            MetricsPusher::from_config(&options.metrics_sink)
        } else {
            MetricsPusher::default()
        };

        tracing::debug!(
            target: TRACING_TARGET,
            job_id = %job.job_id(),
            event_log = event_log.is_some(),
            checkpoint = checkpoint.is_some(),
            metrics_push = pusher.is_enabled(),
            "Side channels initialized"
        );

        Ok(Self {
            job,
            app_name: options.app_name().to_owned(),
            engine: ctx.engine().info(),
            mode,
            metrics: ctx.metrics().clone(),
            watermarks: ctx.watermarks().clone(),
            checkpoint,
            watermarks_enabled: options.watermarks_enabled,
            pusher,
            event_log,
        })
    }

    /// Returns true if an event log is being written.
    pub fn has_event_log(&self) -> bool {
        self.event_log.is_some()
    }

    /// Returns the listeners to register, in registration order: metrics
    /// checkpointing, user listeners, watermark bridge.
    pub fn listeners(
        &self,
        user: &[Arc<dyn StreamingListener>],
    ) -> Vec<Arc<dyn StreamingListener>> {
        if !self.mode.is_streaming() {
            return Vec::new();
        }

        let mut listeners: Vec<Arc<dyn StreamingListener>> = Vec::with_capacity(user.len() + 2);
        if let Some(checkpoint) = &self.checkpoint {
            listeners.push(Arc::new(CheckpointingListener::new(
                self.metrics.clone(),
                checkpoint.clone(),
            )));
        }
        listeners.extend(user.iter().cloned());
        if self.watermarks_enabled {
            listeners.push(Arc::new(WatermarkAdvancingListener::new(
                self.watermarks.clone(),
            )));
        }
        listeners
    }

    /// Registers the job's listeners on a streaming context.
    pub fn attach(&self, streaming: &dyn StreamingContext, user: &[Arc<dyn StreamingListener>]) {
        for listener in self.listeners(user) {
            tracing::debug!(
                target: TRACING_TARGET,
                listener = listener.name(),
                "Registering streaming listener"
            );
            streaming.add_listener(listener);
        }
    }

    /// Records the executor and application start events.
    pub fn record_start(&self) -> Result<()> {
        let Some(event_log) = &self.event_log else {
            return Ok(());
        };

        event_log.record(&LogEvent::ExecutorAdded {
            timestamp: Timestamp::now(),
            executor_id: self.engine.executor_id.clone(),
            master: self.engine.master.clone(),
        })?;
        event_log.record(&LogEvent::ApplicationStart {
            timestamp: Timestamp::now(),
            app_name: self.app_name.clone(),
            app_id: self.job.job_id().to_owned(),
            user: self.engine.user.clone(),
        })?;
        Ok(())
    }

    /// Pushes the final metrics and closes the event log.
    ///
    /// Failures are logged; finalization never changes the job outcome.
    pub async fn finalize(self, status: &str) {
        let snapshot = self.metrics.snapshot();
        self.pusher.push(&self.job, &snapshot).await;

        let Some(event_log) = self.event_log else {
            return;
        };

        let end = LogEvent::ApplicationEnd {
            timestamp: Timestamp::now(),
            status: status.to_owned(),
            metrics: snapshot.render(),
        };
        let closed = event_log.record(&end).and_then(|()| event_log.close());
        match closed {
            Ok(path) => tracing::debug!(
                target: TRACING_TARGET,
                job_id = %self.job.job_id(),
                path = %path.display(),
                "Event log written"
            ),
            Err(error) => tracing::warn!(
                target: TRACING_TARGET,
                job_id = %self.job.job_id(),
                error = %error,
                "Failed to finalize event log"
            ),
        }
    }
}
