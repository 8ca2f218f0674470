//! In-process reference engine.
//!
//! [`LocalEngine`] and [`LocalTranslator`] implement the collaborator traits
//! without a cluster: batch outputs are forced directly, streaming contexts
//! tick on the current tokio runtime. Transforms are not interpreted; each
//! executable unit only reports element counts and watermarks, which is
//! enough to drive the runner end to end.

mod dataset;
mod engine;
mod streaming;
mod translator;

pub use dataset::LocalDataset;
pub use engine::{LocalEngine, LocalEngineConfig, LocalEngineConfigBuilder};
pub use streaming::LocalStreamingContext;
pub use translator::LocalTranslator;

/// Tracing target for the local engine.
pub const TRACING_TARGET: &str = "strata_runtime::local";

/// Metric namespace used by local datasets.
pub const METRICS_NAMESPACE: &str = "local";

/// Counter incremented by every processed element.
pub const ELEMENTS_METRIC: &str = "elements";
