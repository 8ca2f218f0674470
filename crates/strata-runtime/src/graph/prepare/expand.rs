//! Splittable ParDo expansion.

use crate::error::{Error, Result};
use crate::graph::{
    Collection, CollectionId, DataflowGraph, NodeId, TRACING_TARGET, TransformNode, urns,
};

/// Rewrites every primitive splittable ParDo into a composite of three
/// primitives: pair with restriction, split and size, process.
///
/// The intermediate collections inherit the boundedness of the main input.
/// Side inputs are only consumed by the process step.
pub(super) fn expand_splittable(mut graph: DataflowGraph) -> Result<DataflowGraph> {
    let splittable: Vec<NodeId> = graph
        .nodes
        .iter()
        .filter(|(_, node)| node.is_primitive() && node.urn == urns::SPLITTABLE_PAR_DO)
        .map(|(id, _)| id.clone())
        .collect();

    for id in splittable {
        expand_node(&mut graph, &id)?;
    }

    Ok(graph)
}

fn expand_node(graph: &mut DataflowGraph, id: &NodeId) -> Result<()> {
    let node = graph.nodes[id].clone();
    let (main_tag, main_input) = main_input(&node)
        .ok_or_else(|| Error::invalid_graph(format!("splittable node {id} has no main input")))?;
    let boundedness = graph.boundedness(&main_input);

    let pair_id = fresh_node_id(graph, format!("{id}/PairWithRestriction"));
    let split_id = fresh_node_id(graph, format!("{id}/SplitAndSizeRestrictions"));
    let process_id = fresh_node_id(graph, format!("{id}/Process"));
    let pair_out = fresh_collection_id(graph, format!("{pair_id}.out"));
    let split_out = fresh_collection_id(graph, format!("{split_id}.out"));

    let mut pair = TransformNode::new(
        format!("{}/PairWithRestriction", node.unique_name),
        urns::PAIR_WITH_RESTRICTION,
    )
    .with_input(main_tag.clone(), main_input)
    .with_output("out", pair_out.clone())
    .with_payload(node.payload.clone());
    pair.fusion_break = node.fusion_break;

    let split = TransformNode::new(
        format!("{}/SplitAndSizeRestrictions", node.unique_name),
        urns::SPLIT_AND_SIZE_RESTRICTIONS,
    )
    .with_input("in", pair_out.clone())
    .with_output("out", split_out.clone())
    .with_payload(node.payload.clone());

    let mut process = TransformNode::new(
        format!("{}/Process", node.unique_name),
        urns::PROCESS_SIZED_ELEMENTS_AND_RESTRICTIONS,
    )
    .with_input(main_tag.clone(), split_out.clone())
    .with_payload(node.payload.clone());
    for (tag, input) in node.inputs.iter().filter(|(tag, _)| **tag != main_tag) {
        process.inputs.insert(tag.clone(), input.clone());
    }
    process.outputs = node.outputs.clone();

    tracing::debug!(
        target: TRACING_TARGET,
        node = %id,
        boundedness = %boundedness,
        side_inputs = node.inputs.len() - 1,
        "Expanding splittable node"
    );

    let collection = Collection {
        name: None,
        boundedness,
    };
    graph
        .add_collection(pair_out, collection.clone())
        .add_collection(split_out, collection)
        .add_node(pair_id.clone(), pair)
        .add_node(split_id.clone(), split)
        .add_node(process_id.clone(), process);

    if let Some(composite) = graph.nodes.get_mut(id) {
        composite.subtransforms = vec![pair_id, split_id, process_id];
    }
    Ok(())
}

/// Returns `base`, or `base-N` with the smallest N not naming a node.
fn fresh_node_id(graph: &DataflowGraph, base: String) -> NodeId {
    let mut candidate = NodeId::new(base.clone());
    let mut suffix = 1;
    while graph.nodes.contains_key(&candidate) {
        candidate = NodeId::new(format!("{base}-{suffix}"));
        suffix += 1;
    }
    candidate
}

fn fresh_collection_id(graph: &DataflowGraph, base: String) -> CollectionId {
    let mut candidate = CollectionId::new(base.clone());
    let mut suffix = 1;
    while graph.collections.contains_key(&candidate) {
        candidate = CollectionId::new(format!("{base}-{suffix}"));
        suffix += 1;
    }
    candidate
}

/// Returns the tag and id of the main input.
fn main_input(node: &TransformNode) -> Option<(String, CollectionId)> {
    let id = node.main_input()?;
    let tag = node
        .inputs
        .iter()
        .find(|(_, input)| *input == id)
        .map(|(tag, _)| tag.clone())?;
    Some((tag, id.clone()))
}
