//! Job execution on the dedicated worker.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::TRACING_TARGET;
use crate::engine::StreamingContext;
use crate::error::{Error, Result};
use crate::graph::DataflowGraph;
use crate::translation::{PipelineTranslator, TranslationContext};

/// Lifecycle state of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    /// Accepted; the worker has not started translating yet.
    Submitted,
    /// The translator is mapping the graph onto the engine.
    Translating,
    /// Outputs are being computed or the stream is running.
    Executing,
    /// The job completed, timed out or was interrupted.
    Finished,
    /// Translation or execution failed.
    Failed,
}

impl JobState {
    /// Returns true for `Finished` and `Failed`.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

/// How a successful job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TerminalStatus {
    /// All outputs were computed, or the stream terminated by itself.
    Done,
    /// The streaming timeout elapsed and the stream was stopped.
    StoppedOnTimeout,
    /// The stream was stopped by a cancel request.
    StoppedOnInterrupt,
}

/// Outcome of awaiting a running stream.
enum Awaited {
    Terminated(Result<()>),
    TimedOut,
    Interrupted,
}

/// A job ready to run on its worker.
pub(crate) struct Execution {
    translator: Arc<dyn PipelineTranslator>,
    graph: DataflowGraph,
    ctx: TranslationContext,
    state: watch::Sender<JobState>,
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

impl Execution {
    pub(crate) fn new(
        translator: Arc<dyn PipelineTranslator>,
        graph: DataflowGraph,
        ctx: TranslationContext,
        state: watch::Sender<JobState>,
        cancel: CancellationToken,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            translator,
            graph,
            ctx,
            state,
            cancel,
            timeout,
        }
    }

    /// Runs the job to a terminal state.
    ///
    /// The streaming context, if any, is stopped exactly once whatever the
    /// outcome.
    pub(crate) async fn run(mut self) -> Result<TerminalStatus> {
        let job_id = self.ctx.job().job_id().to_owned();
        let streaming = self.ctx.streaming_context().cloned();

        let outcome = AssertUnwindSafe(self.execute(streaming.as_deref()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(Error::internal(format!(
                    "job panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });
        if let Some(streaming) = &streaming {
            streaming.stop(true);
        }

        match &outcome {
            Ok(status) => {
                self.state.send_replace(JobState::Finished);
                tracing::info!(
                    target: TRACING_TARGET,
                    job_id = %job_id,
                    status = %status,
                    "Job finished"
                );
            }
            Err(error) => {
                self.state.send_replace(JobState::Failed);
                tracing::error!(
                    target: TRACING_TARGET,
                    job_id = %job_id,
                    error = %error,
                    "Job failed"
                );
            }
        }
        outcome
    }

    async fn execute(
        &mut self,
        streaming: Option<&dyn StreamingContext>,
    ) -> Result<TerminalStatus> {
        self.state.send_replace(JobState::Translating);
        self.translator.translate(&self.graph, &mut self.ctx)?;

        self.state.send_replace(JobState::Executing);
        self.ctx.compute_outputs().await?;

        let Some(streaming) = streaming else {
            return Ok(TerminalStatus::Done);
        };

        streaming.start()?;
        let started = Instant::now();
        let awaited = tokio::select! {
            biased;

            () = self.cancel.cancelled() => Awaited::Interrupted,
            awaited = await_termination(streaming.await_termination(), self.timeout) => awaited,
        };

        let job_id = self.ctx.job().job_id();
        match awaited {
            Awaited::Terminated(result) => result.map(|()| TerminalStatus::Done),
            Awaited::TimedOut => {
                tracing::info!(
                    target: TRACING_TARGET,
                    job_id = %job_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Streaming timeout reached, stopping"
                );
                Ok(TerminalStatus::StoppedOnTimeout)
            }
            Awaited::Interrupted => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    job_id = %job_id,
                    "Streaming job interrupted, stopping gracefully"
                );
                Ok(TerminalStatus::StoppedOnInterrupt)
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("unknown panic payload")
    }
}

async fn await_termination(
    termination: impl Future<Output = Result<()>>,
    timeout: Option<Duration>,
) -> Awaited {
    match timeout {
        None => Awaited::Terminated(termination.await),
        Some(timeout) => match tokio::time::timeout(timeout, termination).await {
            Ok(result) => Awaited::Terminated(result),
            Err(_) => Awaited::TimedOut,
        },
    }
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execution")
            .field("ctx", &self.ctx)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(JobState::Finished.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Executing.is_terminal());
    }

    #[test]
    fn panic_payloads_become_messages() {
        let text: Box<dyn Any + Send> = Box::new("static text");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned text"));
        let other: Box<dyn Any + Send> = Box::new(7_u8);

        assert_eq!(panic_message(text.as_ref()), "static text");
        assert_eq!(panic_message(owned.as_ref()), "owned text");
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }

    #[test]
    fn statuses_render_in_snake_case() {
        assert_eq!(TerminalStatus::StoppedOnTimeout.to_string(), "stopped_on_timeout");
        assert_eq!(JobState::Translating.as_ref(), "translating");
    }

    #[tokio::test]
    async fn termination_without_timeout_waits() {
        let awaited = await_termination(async { Ok(()) }, None).await;
        assert!(matches!(awaited, Awaited::Terminated(Ok(()))));
    }

    #[tokio::test(start_paused = true)]
    async fn termination_times_out() {
        let awaited =
            await_termination(std::future::pending(), Some(Duration::from_millis(50))).await;
        assert!(matches!(awaited, Awaited::TimedOut));
    }
}
