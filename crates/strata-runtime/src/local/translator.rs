//! Local translator.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::{LocalDataset, TRACING_TARGET};
use crate::error::{Error, Result};
use crate::graph::{CollectionId, DataflowGraph, Urn, urns};
use crate::mode::ExecutionMode;
use crate::translation::{Dataset, PipelineTranslator, TranslationContext};

/// Translates prepared graphs into [`LocalDataset`]s.
///
/// Every executable unit becomes one dataset registered under each of its
/// output collections. Primitives that are neither native nor fused are
/// rejected.
#[derive(Debug, Clone)]
pub struct LocalTranslator {
    mode: ExecutionMode,
    records_per_batch: u64,
}

impl LocalTranslator {
    /// Creates the batch translator.
    pub fn batch() -> Self {
        Self {
            mode: ExecutionMode::Batch,
            records_per_batch: 1,
        }
    }

    /// Creates the streaming translator.
    pub fn streaming() -> Self {
        Self {
            mode: ExecutionMode::Streaming,
            records_per_batch: 1,
        }
    }

    /// Sets the number of elements each unit reports per action.
    pub fn with_records_per_batch(mut self, records: u64) -> Self {
        self.records_per_batch = records;
        self
    }

    /// Returns the mode this translator serves.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }
}

impl PipelineTranslator for LocalTranslator {
    fn known_urns(&self) -> BTreeSet<Urn> {
        BTreeSet::from([
            urns::IMPULSE,
            urns::READ,
            urns::GROUP_BY_KEY,
            urns::FLATTEN,
            urns::RESHUFFLE,
        ])
    }

    fn translate(&self, graph: &DataflowGraph, ctx: &mut TranslationContext) -> Result<()> {
        let known = self.known_urns();

        for id in graph.topological_order()? {
            let node = &graph.nodes[&id];
            let transforms: Vec<String> = match &node.stage {
                Some(stage) => stage
                    .transforms
                    .iter()
                    .filter_map(|t| graph.nodes.get(t))
                    .map(|t| t.unique_name.clone())
                    .collect(),
                None if known.contains(&node.urn) => vec![node.unique_name.clone()],
                None => {
                    return Err(Error::translation(format!(
                        "unsupported transform {} ({})",
                        node.unique_name, node.urn
                    )));
                }
            };

            let mut inputs: Vec<Arc<dyn Dataset>> = Vec::with_capacity(node.inputs.len());
            for input in node.inputs.values() {
                let dataset = ctx.dataset(input).ok_or_else(|| {
                    Error::translation(format!(
                        "input {input} of {} was not translated",
                        node.unique_name
                    ))
                })?;
                inputs.push(dataset);
            }

            let mut dataset =
                LocalDataset::new(node.unique_name.clone(), id.as_str(), ctx.metrics().clone())
                    .with_transforms(transforms)
                    .with_inputs(inputs)
                    .with_records(self.records_per_batch);
            if ctx.mode().is_streaming() {
                dataset = dataset.streaming(ctx.watermarks().clone());
            }

            tracing::trace!(
                target: TRACING_TARGET,
                node = %id,
                urn = %node.urn,
                "Translated unit"
            );

            let dataset: Arc<dyn Dataset> = Arc::new(dataset);
            if node.outputs.is_empty() {
                ctx.put_dataset(CollectionId::new(format!("{id}.sink")), dataset);
            } else {
                for output in node.outputs.values() {
                    ctx.put_dataset(output.clone(), Arc::clone(&dataset));
                }
            }
        }

        Ok(())
    }
}
