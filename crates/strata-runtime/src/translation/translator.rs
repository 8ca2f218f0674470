//! Translator collaborator trait.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::TranslationContext;
use crate::engine::Engine;
use crate::error::Result;
use crate::graph::{DataflowGraph, Urn};
use crate::job::JobInfo;
use crate::mode::ExecutionMode;
use crate::options::PipelineOptions;

/// Maps a prepared graph onto engine operators.
///
/// The runner holds one translator for batch jobs and one for streaming
/// jobs.
pub trait PipelineTranslator: Send + Sync + 'static {
    /// Returns the URNs this translator handles natively.
    ///
    /// Nodes with these URNs are never fused or expanded.
    fn known_urns(&self) -> BTreeSet<Urn>;

    /// Creates the context the translator populates.
    fn create_translation_context(
        &self,
        engine: Arc<dyn Engine>,
        options: &PipelineOptions,
        job: &JobInfo,
        mode: ExecutionMode,
    ) -> Result<TranslationContext> {
        TranslationContext::create(engine, options, job.clone(), mode)
    }

    /// Translates a prepared graph, registering its datasets on `ctx`.
    fn translate(&self, graph: &DataflowGraph, ctx: &mut TranslationContext) -> Result<()>;
}
