//! Dataflow graph model and preparation.
//!
//! A [`DataflowGraph`] is a table of [`TransformNode`]s connected by
//! [`Collection`]s. The [`GraphPreparer`] rewrites a submitted graph into
//! executable stages before translation.

mod collection;
mod dataflow;
mod id;
mod node;
mod prepare;
mod urn;

pub use collection::{Boundedness, Collection};
pub use dataflow::DataflowGraph;
pub use id::{CollectionId, NodeId};
pub use node::{StagePayload, TransformNode};
pub use prepare::GraphPreparer;
pub use urn::{Urn, urns};

/// Tracing target for graph preparation.
pub const TRACING_TARGET: &str = "strata_runtime::graph";
