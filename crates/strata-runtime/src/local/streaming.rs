//! Local streaming context.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::TRACING_TARGET;
use crate::engine::{BatchInfo, StreamingContext, StreamingListener};
use crate::error::{Error, Result};
use crate::translation::Dataset;

#[derive(Default)]
struct Shared {
    listeners: Mutex<Vec<Arc<dyn StreamingListener>>>,
    outputs: Mutex<Vec<Arc<dyn Dataset>>>,
    checkpoint_dir: Mutex<Option<String>>,
    failure: Mutex<Option<String>>,
    started: AtomicBool,
    stop_count: AtomicUsize,
    batches: AtomicU64,
    stop: CancellationToken,
    terminated: CancellationToken,
}

/// Streaming context ticking on the current tokio runtime.
///
/// Every batch forces all registered outputs and then notifies listeners in
/// registration order. The context terminates by itself after the
/// configured number of batches, on the first output failure, or when
/// stopped.
#[derive(Clone)]
pub struct LocalStreamingContext {
    batch_interval: Duration,
    max_batches: Option<u64>,
    shared: Arc<Shared>,
}

impl LocalStreamingContext {
    /// Creates a stopped context.
    pub fn new(batch_interval: Duration, max_batches: Option<u64>) -> Self {
        Self {
            batch_interval,
            max_batches,
            shared: Arc::default(),
        }
    }

    /// Returns how many times `stop` was called.
    pub fn stop_count(&self) -> usize {
        self.shared.stop_count.load(Ordering::Acquire)
    }

    /// Returns the number of completed batches.
    pub fn completed_batches(&self) -> u64 {
        self.shared.batches.load(Ordering::Acquire)
    }

    /// Returns the names of registered listeners in registration order.
    pub fn listener_names(&self) -> Vec<String> {
        self.listeners()
            .iter()
            .map(|listener| listener.name().to_owned())
            .collect()
    }

    /// Returns the bound checkpoint directory.
    pub fn checkpoint_dir(&self) -> Option<String> {
        self.shared
            .checkpoint_dir
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true once the context has terminated.
    pub fn is_terminated(&self) -> bool {
        self.shared.terminated.is_cancelled()
    }

    fn listeners(&self) -> Vec<Arc<dyn StreamingListener>> {
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn outputs(&self) -> Vec<Arc<dyn Dataset>> {
        self.shared
            .outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn run_batches(self) {
        for listener in self.listeners() {
            listener.on_streaming_started(Timestamp::now());
        }

        let mut ticker = tokio::time::interval(self.batch_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                () = self.shared.stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let started = Instant::now();
            let outputs = self.outputs();
            let mut records = 0u64;
            let mut failed = false;
            for output in &outputs {
                match output.action().await {
                    Ok(()) => records += 1,
                    Err(error) => {
                        tracing::error!(
                            target: TRACING_TARGET,
                            output = output.name(),
                            error = %error,
                            "Streaming output failed"
                        );
                        *self
                            .shared
                            .failure
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner) = Some(error.to_string());
                        failed = true;
                        break;
                    }
                }
            }
            if failed {
                break;
            }

            let completed = self.shared.batches.fetch_add(1, Ordering::AcqRel) + 1;
            let batch = BatchInfo {
                batch_time: Timestamp::now(),
                num_records: records,
                processing_delay: started.elapsed(),
            };
            for listener in self.listeners() {
                listener.on_batch_completed(&batch);
            }

            tracing::trace!(
                target: TRACING_TARGET,
                batch = completed,
                outputs = outputs.len(),
                "Batch completed"
            );

            if self.max_batches.is_some_and(|max| completed >= max) {
                break;
            }
        }

        self.shared.terminated.cancel();
    }
}

#[async_trait]
impl StreamingContext for LocalStreamingContext {
    fn add_listener(&self, listener: Arc<dyn StreamingListener>) {
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn checkpoint(&self, dir: &str) {
        *self
            .shared
            .checkpoint_dir
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(dir.to_owned());
    }

    fn register_output(&self, output: Arc<dyn Dataset>) -> Result<()> {
        if self.shared.started.load(Ordering::Acquire) {
            return Err(Error::engine("outputs must be registered before start"));
        }
        self.shared
            .outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(output);
        Ok(())
    }

    fn start(&self) -> Result<()> {
        if self.shared.started.swap(true, Ordering::AcqRel) {
            return Err(Error::engine("streaming context already started"));
        }
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::engine("streaming context must start inside a tokio runtime"))?;

        tracing::debug!(
            target: TRACING_TARGET,
            batch_interval_ms = self.batch_interval.as_millis() as u64,
            outputs = self.outputs().len(),
            listeners = self.listeners().len(),
            "Starting streaming context"
        );
        let batches = handle.spawn(self.clone().run_batches());
        let shared = Arc::clone(&self.shared);
        handle.spawn(async move {
            if let Err(error) = batches.await {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %error,
                    "Streaming batch loop aborted"
                );
                *shared
                    .failure
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) =
                    Some(format!("streaming batch loop aborted: {error}"));
                shared.terminated.cancel();
            }
        });
        Ok(())
    }

    async fn await_termination(&self) -> Result<()> {
        self.shared.terminated.cancelled().await;

        let failure = self
            .shared
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match failure {
            Some(message) => Err(Error::engine(message)),
            None => Ok(()),
        }
    }

    fn stop(&self, graceful: bool) {
        self.shared.stop_count.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(
            target: TRACING_TARGET,
            graceful,
            batches = self.completed_batches(),
            "Stopping streaming context"
        );

        self.shared.stop.cancel();
        if !self.shared.started.load(Ordering::Acquire) {
            self.shared.terminated.cancel();
        }
    }
}

impl std::fmt::Debug for LocalStreamingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStreamingContext")
            .field("batch_interval", &self.batch_interval)
            .field("max_batches", &self.max_batches)
            .field("batches", &self.completed_batches())
            .field("stop_count", &self.stop_count())
            .finish()
    }
}
