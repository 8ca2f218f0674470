//! Translation of prepared graphs onto an engine.

mod context;
mod translator;

use async_trait::async_trait;

pub use context::TranslationContext;
pub use translator::PipelineTranslator;

use crate::error::Result;

/// Tracing target for translation operations.
pub const TRACING_TARGET: &str = "strata_runtime::translation";

/// An engine-side dataset produced by translation.
#[async_trait]
pub trait Dataset: Send + Sync {
    /// Returns a short name used in logs.
    fn name(&self) -> &str;

    /// Forces computation of the dataset.
    async fn action(&self) -> Result<()>;
}
