//! Job submission and supervision.
//!
//! [`Runner::run`] selects the execution mode, prepares the graph, creates
//! the translation context, initializes the job's side channels and hands
//! everything to a dedicated worker. The returned [`PipelineResult`]
//! observes the job until it finishes.

mod coordinator;
mod result;
mod worker;

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub use coordinator::{JobState, TerminalStatus};
pub use result::PipelineResult;

use self::coordinator::Execution;
use self::result::ResultParts;
use crate::engine::{Engine, StreamingListener};
use crate::error::Result;
use crate::graph::{DataflowGraph, GraphPreparer};
use crate::job::JobInfo;
use crate::mode::ExecutionMode;
use crate::options::PipelineOptions;
use crate::side_channel::SideChannels;
use crate::translation::{PipelineTranslator, TranslationContext};

/// Tracing target for job supervision.
pub const TRACING_TARGET: &str = "strata_runtime::runner";

/// Submits dataflow graphs to an engine.
#[derive(Clone)]
pub struct Runner {
    options: PipelineOptions,
    engine: Arc<dyn Engine>,
    batch: Arc<dyn PipelineTranslator>,
    streaming: Arc<dyn PipelineTranslator>,
    listeners: Vec<Arc<dyn StreamingListener>>,
}

impl Runner {
    /// Creates a runner with separate batch and streaming translators.
    pub fn new(
        options: PipelineOptions,
        engine: Arc<dyn Engine>,
        batch: Arc<dyn PipelineTranslator>,
        streaming: Arc<dyn PipelineTranslator>,
    ) -> Self {
        Self {
            options,
            engine,
            batch,
            streaming,
            listeners: Vec::new(),
        }
    }

    /// Adds a user listener, registered on every streaming job after the
    /// metrics checkpointing listener and before the watermark bridge.
    pub fn with_listener(mut self, listener: Arc<dyn StreamingListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Returns the runner's options.
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Submits a graph and returns once the job runs on its worker.
    ///
    /// # Errors
    ///
    /// Fails before any worker starts if the options or the graph are
    /// invalid, or if the event log directory is unusable. Translation and
    /// execution failures are reported by [`PipelineResult::wait_until_finish`].
    pub fn run(&self, graph: DataflowGraph, job: JobInfo) -> Result<PipelineResult> {
        self.options.validate()?;

        let mode = ExecutionMode::select(&self.options, &graph);
        let translator = match mode {
            ExecutionMode::Batch => Arc::clone(&self.batch),
            ExecutionMode::Streaming => Arc::clone(&self.streaming),
        };

        let engine = self.engine.info();
        tracing::info!(
            target: TRACING_TARGET,
            job_id = %job.job_id(),
            job_name = %job.job_name(),
            mode = %mode,
            master = %engine.master,
            "Running job"
        );

        let graph = GraphPreparer::new(translator.known_urns()).prepare(graph)?;
        let ctx = translator.create_translation_context(
            Arc::clone(&self.engine),
            &self.options,
            &job,
            mode,
        )?;

        let side_channels = match self.init_side_channels(&ctx) {
            Ok(side_channels) => side_channels,
            Err(error) => {
                if let Some(streaming) = ctx.streaming_context() {
                    streaming.stop(false);
                }
                return Err(error);
            }
        };

        let (state, state_receiver) = watch::channel(JobState::Submitted);
        let cancel = CancellationToken::new();
        let parts = ResultParts {
            job: job.clone(),
            mode,
            metrics: ctx.metrics().clone(),
            watermarks: ctx.watermarks().clone(),
            streaming: ctx.streaming_context().cloned(),
            state: state_receiver,
            cancel: cancel.clone(),
        };

        let execution = Execution::new(
            translator,
            graph,
            ctx,
            state,
            cancel,
            self.options.streaming_timeout(),
        );
        let worker = worker::spawn_dedicated(format!("strata-job-{}", job.job_name()), move || {
            async move {
                let outcome = execution.run().await;
                let status = match &outcome {
                    Ok(status) => status.to_string(),
                    Err(_) => JobState::Failed.to_string(),
                };
                side_channels.finalize(&status).await;
                outcome
            }
        })?;

        tracing::debug!(
            target: TRACING_TARGET,
            job_id = %job.job_id(),
            "Job submitted"
        );

        Ok(PipelineResult::new(parts, worker))
    }

    fn init_side_channels(&self, ctx: &TranslationContext) -> Result<SideChannels> {
        let side_channels = SideChannels::init(&self.options, ctx)?;
        if let Some(streaming) = ctx.streaming_context() {
            side_channels.attach(streaming.as_ref(), &self.listeners);
        }
        side_channels.record_start()?;
        Ok(side_channels)
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("options", &self.options)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
