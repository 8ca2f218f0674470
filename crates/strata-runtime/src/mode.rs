//! Execution mode selection.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::graph::DataflowGraph;
use crate::options::PipelineOptions;

/// Whether a job runs to completion or as a continuous stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionMode {
    /// Bounded execution; the job finishes when all outputs are computed.
    Batch,
    /// Unbounded execution; the job runs until stopped or timed out.
    Streaming,
}

impl ExecutionMode {
    /// Selects the mode for a job.
    ///
    /// Streaming is chosen when the options ask for it or when the graph
    /// contains an unbounded collection.
    pub fn select(options: &PipelineOptions, graph: &DataflowGraph) -> Self {
        if options.streaming || graph.has_unbounded_collections() {
            Self::Streaming
        } else {
            Self::Batch
        }
    }

    /// Returns true for streaming execution.
    #[inline]
    pub const fn is_streaming(self) -> bool {
        matches!(self, Self::Streaming)
    }
}
