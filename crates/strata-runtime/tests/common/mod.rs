#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use strata_runtime::engine::{BatchInfo, StreamingListener};
use strata_runtime::graph::{Collection, DataflowGraph, TransformNode, urns};
use strata_runtime::local::{LocalEngine, LocalEngineConfigBuilder, LocalTranslator};
use strata_runtime::{PipelineOptions, Runner};

/// create -> map -> format, all bounded.
pub fn bounded_chain() -> DataflowGraph {
    let mut graph = DataflowGraph::new();
    for id in ["create.out", "map.out", "format.out"] {
        graph.add_collection(id, Collection::bounded());
    }
    graph
        .add_root(
            "create",
            TransformNode::new("Create", urns::PAR_DO).with_output("out", "create.out"),
        )
        .add_root(
            "map",
            TransformNode::new("Map", urns::PAR_DO)
                .with_input("in", "create.out")
                .with_output("out", "map.out"),
        )
        .add_root(
            "format",
            TransformNode::new("Format", urns::PAR_DO)
                .with_input("in", "map.out")
                .with_output("out", "format.out"),
        );
    graph
}

/// read (unbounded) -> map.
pub fn unbounded_source() -> DataflowGraph {
    let mut graph = DataflowGraph::new();
    graph
        .add_collection("read.out", Collection::unbounded())
        .add_collection("map.out", Collection::unbounded())
        .add_root(
            "read",
            TransformNode::new("ReadTopic", urns::READ).with_output("out", "read.out"),
        )
        .add_root(
            "map",
            TransformNode::new("Map", urns::PAR_DO)
                .with_input("in", "read.out")
                .with_output("out", "map.out"),
        );
    graph
}

/// Options with the streaming checkpoint inside `dir`.
pub fn options_in(dir: &Path) -> PipelineOptions {
    PipelineOptions {
        job_name: "test".to_owned(),
        batch_interval_ms: 10,
        checkpoint_dir: Some(dir.join("checkpoint").to_string_lossy().into_owned()),
        ..Default::default()
    }
}

/// Local engine whose streams never terminate by themselves.
pub fn endless_engine() -> Arc<LocalEngine> {
    Arc::new(LocalEngine::default())
}

/// Local engine whose streams terminate after `batches` batches.
pub fn bounded_engine(batches: u64) -> Arc<LocalEngine> {
    let config = LocalEngineConfigBuilder::default()
        .max_batches(batches)
        .build()
        .unwrap();
    Arc::new(LocalEngine::new(config))
}

pub fn runner(options: PipelineOptions, engine: Arc<LocalEngine>) -> Runner {
    Runner::new(
        options,
        engine,
        Arc::new(LocalTranslator::batch()),
        Arc::new(LocalTranslator::streaming()),
    )
}

/// Counts completed batches.
#[derive(Debug, Default)]
pub struct CountingListener {
    pub batches: AtomicU64,
}

impl CountingListener {
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }
}

impl StreamingListener for CountingListener {
    fn name(&self) -> &str {
        "counting"
    }

    fn on_batch_completed(&self, _batch: &BatchInfo) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }
}
