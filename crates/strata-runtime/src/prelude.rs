//! Prelude module for convenient imports.
//!
//! This module re-exports commonly used types for ergonomic imports:
//!
//! ```rust
//! use strata_runtime::prelude::*;
//! ```

pub use crate::engine::{BatchInfo, Engine, EngineInfo, StreamingContext, StreamingListener};
pub use crate::error::{Error, Result};
pub use crate::graph::{
    Boundedness, Collection, CollectionId, DataflowGraph, GraphPreparer, NodeId, TransformNode,
    Urn, urns,
};
pub use crate::job::JobInfo;
pub use crate::metrics::{MetricKey, MetricValue, MetricsAccumulator, MetricsSnapshot};
pub use crate::mode::ExecutionMode;
pub use crate::options::{MetricsSinkConfig, PipelineOptions};
pub use crate::runner::{JobState, PipelineResult, Runner, TerminalStatus};
pub use crate::translation::{Dataset, PipelineTranslator, TranslationContext};
