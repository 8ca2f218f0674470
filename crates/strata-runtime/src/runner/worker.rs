//! Dedicated per-job worker thread.

use std::future::Future;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::oneshot;

use super::{TRACING_TARGET, TerminalStatus};
use crate::error::{Error, Result};

/// Outcome published by a worker. Errors are shared so the outcome can be
/// memoized and handed out more than once.
pub(crate) type Outcome = Result<TerminalStatus, Arc<Error>>;

/// Time granted to background tasks when the worker's runtime shuts down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Handle to a running worker.
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    receiver: oneshot::Receiver<Outcome>,
    received: Option<Outcome>,
    thread: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Waits for the worker's outcome.
    ///
    /// Cancel safe: if the returned future is dropped before completion the
    /// handle can be awaited again.
    pub(crate) async fn join(&mut self) -> Outcome {
        let outcome = match &self.received {
            Some(outcome) => outcome.clone(),
            None => {
                let outcome = match (&mut self.receiver).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(Arc::new(Error::internal(
                        "job worker exited without reporting an outcome",
                    ))),
                };
                self.received = Some(outcome.clone());
                outcome
            }
        };

        if let Some(thread) = self.thread.take() {
            let name = thread.thread().name().map(str::to_owned);
            let joined = tokio::task::spawn_blocking(move || thread.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                tracing::warn!(
                    target: TRACING_TARGET,
                    worker = ?name,
                    "Job worker did not exit cleanly"
                );
            }
        }

        outcome
    }
}

/// Runs `task` on a new OS thread with its own current-thread runtime.
///
/// The runtime is shut down before the outcome is published, so background
/// tasks spawned by the job do not outlive it.
pub(crate) fn spawn_dedicated<F, Fut>(name: String, task: F) -> Result<WorkerHandle>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<TerminalStatus>> + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let thread = thread::Builder::new().name(name).spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
        {
            Ok(runtime) => runtime,
            Err(error) => {
                let error = Error::engine(format!("failed to start job runtime: {error}"));
                let _ = sender.send(Err(Arc::new(error)));
                return;
            }
        };

        let outcome = runtime.block_on(task()).map_err(Arc::new);
        runtime.shutdown_timeout(SHUTDOWN_GRACE);
        let _ = sender.send(outcome);
    })?;

    Ok(WorkerHandle {
        receiver,
        received: None,
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publishes_outcome() {
        let mut handle =
            spawn_dedicated("test-worker".into(), || async { Ok(TerminalStatus::Done) }).unwrap();
        assert_eq!(handle.join().await.unwrap(), TerminalStatus::Done);
    }

    #[tokio::test]
    async fn publishes_errors() {
        let mut handle = spawn_dedicated("test-worker".into(), || async {
            Err::<TerminalStatus, _>(Error::execution("boom"))
        })
        .unwrap();

        let error = handle.join().await.unwrap_err();
        assert!(matches!(*error, Error::Execution { .. }));
    }

    #[tokio::test]
    async fn panics_become_errors() {
        let mut handle = spawn_dedicated("test-worker".into(), || async {
            let status: Result<TerminalStatus> = Err(Error::internal("unused"));
            if status.is_err() {
                panic!("worker panic");
            }
            status
        })
        .unwrap();

        assert!(matches!(*handle.join().await.unwrap_err(), Error::Internal(_)));
    }
}
