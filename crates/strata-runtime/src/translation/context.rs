//! Job-scoped translation state.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;

use super::{Dataset, TRACING_TARGET};
use crate::engine::{Engine, StreamingContext};
use crate::error::{Error, Result};
use crate::graph::CollectionId;
use crate::job::JobInfo;
use crate::metrics::MetricsAccumulator;
use crate::mode::ExecutionMode;
use crate::options::PipelineOptions;
use crate::side_channel::WatermarkTable;

/// Mutable state populated by the translator and read by the coordinator.
///
/// Exactly one context exists per job. It owns the engine handle, the
/// streaming sub-context for streaming jobs, the datasets registered during
/// translation, and the job's metrics accumulator and watermark table.
pub struct TranslationContext {
    engine: Arc<dyn Engine>,
    options: PipelineOptions,
    job: JobInfo,
    mode: ExecutionMode,
    streaming: Option<Arc<dyn StreamingContext>>,
    datasets: BTreeMap<CollectionId, Arc<dyn Dataset>>,
    leaves: Vec<CollectionId>,
    metrics: MetricsAccumulator,
    watermarks: WatermarkTable,
}

impl TranslationContext {
    /// Creates the context for a job.
    ///
    /// Streaming jobs additionally get a streaming context bound to the
    /// configured checkpoint directory. The directory is not checked here;
    /// problems surface when the context runs.
    pub fn create(
        engine: Arc<dyn Engine>,
        options: &PipelineOptions,
        job: JobInfo,
        mode: ExecutionMode,
    ) -> Result<Self> {
        let streaming = match mode {
            ExecutionMode::Batch => None,
            ExecutionMode::Streaming => {
                let streaming = engine.create_streaming_context(options.batch_interval())?;
                streaming.checkpoint(&options.checkpoint_dir());
                Some(streaming)
            }
        };

        tracing::debug!(
            target: TRACING_TARGET,
            job_id = %job.job_id(),
            mode = %mode,
            "Translation context created"
        );

        Ok(Self {
            engine,
            options: options.clone(),
            job,
            mode,
            streaming,
            datasets: BTreeMap::new(),
            leaves: Vec::new(),
            metrics: MetricsAccumulator::new(),
            watermarks: WatermarkTable::new(),
        })
    }

    /// Returns the engine handle.
    #[inline]
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Returns the job's options.
    #[inline]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Returns the job identity.
    #[inline]
    pub fn job(&self) -> &JobInfo {
        &self.job
    }

    /// Returns the execution mode.
    #[inline]
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Returns the streaming context of a streaming job.
    #[inline]
    pub fn streaming_context(&self) -> Option<&Arc<dyn StreamingContext>> {
        self.streaming.as_ref()
    }

    /// Returns the job's metrics accumulator.
    #[inline]
    pub fn metrics(&self) -> &MetricsAccumulator {
        &self.metrics
    }

    /// Returns the job's watermark table.
    #[inline]
    pub fn watermarks(&self) -> &WatermarkTable {
        &self.watermarks
    }

    /// Registers the dataset of a collection as a leaf.
    pub fn put_dataset(&mut self, id: impl Into<CollectionId>, dataset: Arc<dyn Dataset>) {
        let id = id.into();
        if !self.leaves.contains(&id) {
            self.leaves.push(id.clone());
        }
        self.datasets.insert(id, dataset);
    }

    /// Returns the dataset of a collection for use as an input.
    ///
    /// A consumed dataset is no longer a leaf.
    pub fn dataset(&mut self, id: &CollectionId) -> Option<Arc<dyn Dataset>> {
        let dataset = self.datasets.get(id).cloned()?;
        self.leaves.retain(|leaf| leaf != id);
        Some(dataset)
    }

    /// Returns the collections whose datasets nothing consumes.
    pub fn leaves(&self) -> &[CollectionId] {
        &self.leaves
    }

    /// Forces every leaf dataset.
    ///
    /// Batch jobs run the leaves' actions concurrently; streaming jobs
    /// register the leaves as outputs of the streaming context.
    pub async fn compute_outputs(&self) -> Result<()> {
        if self.streaming.is_none() && self.mode.is_streaming() {
            return Err(Error::internal("streaming job has no streaming context"));
        }

        let outputs: Vec<(&CollectionId, &Arc<dyn Dataset>)> = self
            .leaves
            .iter()
            .filter_map(|id| self.datasets.get(id).map(|dataset| (id, dataset)))
            .collect();
        for (id, dataset) in &outputs {
            tracing::debug!(
                target: TRACING_TARGET,
                collection = %id,
                dataset = dataset.name(),
                "Computing output"
            );
        }

        match &self.streaming {
            None => {
                try_join_all(outputs.iter().map(|(_, dataset)| dataset.action())).await?;
            }
            Some(streaming) => {
                for (_, dataset) in outputs {
                    streaming.register_output(Arc::clone(dataset))?;
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for TranslationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationContext")
            .field("job_id", &self.job.job_id())
            .field("mode", &self.mode)
            .field("leaves", &self.leaves)
            .field("metrics", &self.metrics.len())
            .finish_non_exhaustive()
    }
}
