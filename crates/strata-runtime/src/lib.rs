#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod bundle;
pub mod engine;
mod error;
pub mod graph;
mod job;
pub mod local;
pub mod metrics;
mod mode;
mod options;
pub mod runner;
pub mod side_channel;
pub mod translation;

#[doc(hidden)]
pub mod prelude;

pub use error::{BoxError, Error, Result};
pub use graph::{DataflowGraph, GraphPreparer};
pub use job::{JobInfo, NO_ARTIFACTS_STAGED_TOKEN, invocation_id};
pub use mode::ExecutionMode;
pub use options::{
    DEFAULT_BATCH_INTERVAL_MS, DEFAULT_EVENT_LOG_DIR, MetricsSinkConfig, PipelineOptions,
    PipelineOptionsBuilder,
};
pub use runner::{JobState, PipelineResult, Runner, TerminalStatus};
pub use translation::{Dataset, PipelineTranslator, TranslationContext};

/// Tracing target for runtime operations.
pub const TRACING_TARGET: &str = "strata_runtime";
