//! Local datasets.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use tokio::sync::OnceCell;

use super::{ELEMENTS_METRIC, METRICS_NAMESPACE};
use crate::error::Result;
use crate::metrics::{MetricKey, MetricsAccumulator};
use crate::side_channel::WatermarkTable;
use crate::translation::Dataset;

/// Dataset of one executable unit.
///
/// Forcing it first forces its inputs, then reports `records` elements for
/// every fused transform. Batch datasets compute at most once; streaming
/// datasets recompute on every batch and publish a watermark for their
/// unit.
pub struct LocalDataset {
    name: String,
    unit: String,
    transforms: Vec<String>,
    inputs: Vec<Arc<dyn Dataset>>,
    records: u64,
    metrics: MetricsAccumulator,
    watermarks: Option<WatermarkTable>,
    computed: Option<OnceCell<()>>,
}

impl LocalDataset {
    /// Creates a batch dataset for a unit.
    pub fn new(
        name: impl Into<String>,
        unit: impl Into<String>,
        metrics: MetricsAccumulator,
    ) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            transforms: Vec::new(),
            inputs: Vec::new(),
            records: 1,
            metrics,
            watermarks: None,
            computed: Some(OnceCell::new()),
        }
    }

    /// Sets the transforms that report elements.
    pub fn with_transforms(mut self, transforms: Vec<String>) -> Self {
        self.transforms = transforms;
        self
    }

    /// Sets the upstream datasets.
    pub fn with_inputs(mut self, inputs: Vec<Arc<dyn Dataset>>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Sets the number of elements reported per transform and action.
    pub fn with_records(mut self, records: u64) -> Self {
        self.records = records;
        self
    }

    /// Makes the dataset recompute on every action and publish watermarks.
    pub fn streaming(mut self, watermarks: WatermarkTable) -> Self {
        self.watermarks = Some(watermarks);
        self.computed = None;
        self
    }

    async fn compute(&self) -> Result<()> {
        for input in &self.inputs {
            input.action().await?;
        }

        let records = i64::try_from(self.records).unwrap_or(i64::MAX);
        for transform in &self.transforms {
            self.metrics.inc_counter(
                MetricKey::new(METRICS_NAMESPACE, ELEMENTS_METRIC).with_step(transform.as_str()),
                records,
            );
        }

        if let Some(watermarks) = &self.watermarks {
            let now = Timestamp::now();
            watermarks.add(self.unit.as_str(), now, now)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Dataset for LocalDataset {
    fn name(&self) -> &str {
        &self.name
    }

    async fn action(&self) -> Result<()> {
        match &self.computed {
            Some(computed) => computed.get_or_try_init(|| self.compute()).await.map(|_| ()),
            None => self.compute().await,
        }
    }
}

impl std::fmt::Debug for LocalDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDataset")
            .field("name", &self.name)
            .field("unit", &self.unit)
            .field("transforms", &self.transforms)
            .field("inputs", &self.inputs.len())
            .finish_non_exhaustive()
    }
}
