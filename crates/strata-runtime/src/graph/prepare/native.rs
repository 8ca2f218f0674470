//! Native subgraph protection.

use std::collections::BTreeSet;

use crate::graph::{DataflowGraph, NodeId, TRACING_TARGET, Urn};

/// Collapses every composite the translator handles natively into a leaf.
///
/// Only the outermost native composite on each path is collapsed; its
/// descendants are removed from the node table and collections that become
/// unreferenced are pruned.
pub(super) fn protect_natives(
    mut graph: DataflowGraph,
    known_urns: &BTreeSet<Urn>,
) -> DataflowGraph {
    let mut natives = Vec::new();
    let mut stack: Vec<NodeId> = graph.root_ids.iter().rev().cloned().collect();
    while let Some(id) = stack.pop() {
        let Some(node) = graph.nodes.get(&id) else {
            continue;
        };
        if !node.is_composite() {
            continue;
        }
        if known_urns.contains(&node.urn) {
            natives.push(id);
        } else {
            stack.extend(node.subtransforms.iter().rev().cloned());
        }
    }

    if natives.is_empty() {
        return graph;
    }

    for id in &natives {
        let mut descendants = Vec::new();
        let mut pending = graph.nodes[id].subtransforms.clone();
        while let Some(child) = pending.pop() {
            if let Some(node) = graph.nodes.get(&child) {
                pending.extend(node.subtransforms.iter().cloned());
            }
            descendants.push(child);
        }

        for child in &descendants {
            graph.nodes.remove(child);
        }
        if let Some(node) = graph.nodes.get_mut(id) {
            node.subtransforms.clear();
        }

        tracing::debug!(
            target: TRACING_TARGET,
            node = %id,
            removed = descendants.len(),
            "Protected native composite"
        );
    }

    graph.prune_unreferenced_collections();
    graph
}
