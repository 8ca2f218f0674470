//! Greedy fusion of primitives into executable stages.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::graph::{
    Boundedness, CollectionId, DataflowGraph, NodeId, StagePayload, TRACING_TARGET, TransformNode,
    Urn, urns,
};

/// A stage under construction.
struct PendingStage {
    transforms: Vec<NodeId>,
    boundedness: Boundedness,
}

/// A root of the fused graph, in creation order.
enum Root {
    Stage(usize),
    Native(NodeId),
}

/// Greedily fuses primitives into executable stages.
///
/// Leaves are visited in topological order. A non-native node joins the
/// stage of its producer if it has exactly one input, the producer is in a
/// stage with the same boundedness, it carries no fusion break and it is
/// not a stage root. Every other non-native node starts a new stage.
pub(super) fn fuse(graph: DataflowGraph, known_urns: &BTreeSet<Urn>) -> Result<DataflowGraph> {
    let order = graph.topological_order()?;

    let mut producers: BTreeMap<&CollectionId, &NodeId> = BTreeMap::new();
    let mut consumers: BTreeMap<&CollectionId, Vec<&NodeId>> = BTreeMap::new();
    for id in &order {
        let node = &graph.nodes[id];
        for output in node.outputs.values() {
            producers.insert(output, id);
        }
        for input in node.inputs.values() {
            consumers.entry(input).or_default().push(id);
        }
    }

    let mut stages: Vec<PendingStage> = Vec::new();
    let mut stage_of: BTreeMap<&NodeId, usize> = BTreeMap::new();
    let mut roots = Vec::new();

    for id in &order {
        let node = &graph.nodes[id];
        if known_urns.contains(&node.urn) {
            roots.push(Root::Native(id.clone()));
            continue;
        }

        let boundedness = node_boundedness(&graph, node);
        let target = producer_stage(node, &producers, &stage_of)
            .filter(|index| stages[*index].boundedness == boundedness);

        match target {
            Some(index) => {
                stages[index].transforms.push(id.clone());
                stage_of.insert(id, index);
            }
            None => {
                stage_of.insert(id, stages.len());
                roots.push(Root::Stage(stages.len()));
                stages.push(PendingStage {
                    transforms: vec![id.clone()],
                    boundedness,
                });
            }
        }
    }

    let mut fused = DataflowGraph {
        nodes: order
            .iter()
            .map(|id| (id.clone(), graph.nodes[id].clone()))
            .collect(),
        collections: graph.collections.clone(),
        root_ids: Vec::with_capacity(roots.len()),
    };

    let mut next_stage = 0usize;
    for root in roots {
        let stage = match root {
            Root::Native(id) => {
                fused.root_ids.push(id);
                continue;
            }
            Root::Stage(index) => &stages[index],
        };

        let stage_id = loop {
            let candidate = NodeId::new(format!("stage-{next_stage}"));
            next_stage += 1;
            if !fused.nodes.contains_key(&candidate) {
                break candidate;
            }
        };

        let node = stage_node(&graph, stage, &producers, &consumers);
        tracing::debug!(
            target: TRACING_TARGET,
            stage = %stage_id,
            transforms = stage.transforms.len(),
            boundedness = %stage.boundedness,
            "Fused executable stage"
        );

        fused.root_ids.push(stage_id.clone());
        fused.nodes.insert(stage_id, node);
    }

    fused.validate()?;
    Ok(fused)
}

/// Returns the stage of the node's single producer, if it can be joined.
fn producer_stage(
    node: &TransformNode,
    producers: &BTreeMap<&CollectionId, &NodeId>,
    stage_of: &BTreeMap<&NodeId, usize>,
) -> Option<usize> {
    if node.fusion_break || node.urn == urns::PROCESS_SIZED_ELEMENTS_AND_RESTRICTIONS {
        return None;
    }
    if node.inputs.len() != 1 {
        return None;
    }

    let input = node.inputs.values().next()?;
    let producer = producers.get(input)?;
    stage_of.get(*producer).copied()
}

/// Unbounded if any output is unbounded, otherwise taken from the inputs.
fn node_boundedness(graph: &DataflowGraph, node: &TransformNode) -> Boundedness {
    let unbounded = node
        .outputs
        .values()
        .chain(node.inputs.values())
        .any(|id| graph.boundedness(id).is_unbounded());

    if unbounded {
        Boundedness::Unbounded
    } else {
        Boundedness::Bounded
    }
}

/// Builds the stage node: inputs come from outside the stage, outputs are
/// consumed outside the stage or not consumed at all.
fn stage_node(
    graph: &DataflowGraph,
    stage: &PendingStage,
    producers: &BTreeMap<&CollectionId, &NodeId>,
    consumers: &BTreeMap<&CollectionId, Vec<&NodeId>>,
) -> TransformNode {
    let members: BTreeSet<&NodeId> = stage.transforms.iter().collect();
    let mut node = TransformNode::new(
        stage
            .transforms
            .iter()
            .map(|id| graph.nodes[id].unique_name.as_str())
            .collect::<Vec<_>>()
            .join(" + "),
        urns::EXECUTABLE_STAGE,
    );

    for id in &stage.transforms {
        let member = &graph.nodes[id];
        for input in member.inputs.values() {
            let internal = producers
                .get(input)
                .is_some_and(|producer| members.contains(producer));
            if !internal {
                node.inputs.insert(input.to_string(), input.clone());
            }
        }
        for output in member.outputs.values() {
            let external = match consumers.get(output) {
                Some(readers) => readers.iter().any(|reader| !members.contains(reader)),
                None => true,
            };
            if external {
                node.outputs.insert(output.to_string(), output.clone());
            }
        }
    }

    node.stage = Some(StagePayload {
        transforms: stage.transforms.clone(),
        boundedness: stage.boundedness,
    });
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Collection;

    fn known() -> BTreeSet<Urn> {
        BTreeSet::from([urns::IMPULSE, urns::GROUP_BY_KEY, urns::FLATTEN])
    }

    fn stage_of<'a>(graph: &'a DataflowGraph, member: &str) -> Option<&'a NodeId> {
        graph.root_ids.iter().find(|id| {
            graph
                .node(*id)
                .and_then(|n| n.stage.as_ref())
                .is_some_and(|s| s.transforms.iter().any(|t| t.as_str() == member))
        })
    }

    #[test]
    fn fusion_break_starts_new_stage() {
        let mut graph = DataflowGraph::new();
        for id in ["a", "b", "c"] {
            graph.add_collection(id, Collection::bounded());
        }
        graph
            .add_root(
                "impulse",
                TransformNode::new("Impulse", urns::IMPULSE).with_output("out", "a"),
            )
            .add_root(
                "first",
                TransformNode::new("First", urns::PAR_DO)
                    .with_input("in", "a")
                    .with_output("out", "b"),
            )
            .add_root(
                "second",
                TransformNode::new("Second", urns::PAR_DO)
                    .with_input("in", "b")
                    .with_output("out", "c")
                    .with_fusion_break(),
            );

        let fused = fuse(graph, &known()).unwrap();
        assert_ne!(stage_of(&fused, "first"), stage_of(&fused, "second"));
    }

    #[test]
    fn boundedness_mismatch_starts_new_stage() {
        let mut graph = DataflowGraph::new();
        graph
            .add_collection("a", Collection::bounded())
            .add_collection("b", Collection::bounded())
            .add_collection("c", Collection::unbounded())
            .add_root(
                "impulse",
                TransformNode::new("Impulse", urns::IMPULSE).with_output("out", "a"),
            )
            .add_root(
                "bounded",
                TransformNode::new("Bounded", urns::PAR_DO)
                    .with_input("in", "a")
                    .with_output("out", "b"),
            )
            .add_root(
                "unbounded",
                TransformNode::new("Unbounded", urns::PAR_DO)
                    .with_input("in", "b")
                    .with_output("out", "c"),
            );

        let fused = fuse(graph, &known()).unwrap();
        assert_ne!(stage_of(&fused, "bounded"), stage_of(&fused, "unbounded"));
    }

    #[test]
    fn multi_input_nodes_start_new_stage() {
        let mut graph = DataflowGraph::new();
        for id in ["a", "b", "c", "d"] {
            graph.add_collection(id, Collection::bounded());
        }
        graph
            .add_root(
                "impulse",
                TransformNode::new("Impulse", urns::IMPULSE).with_output("out", "a"),
            )
            .add_root(
                "left",
                TransformNode::new("Left", urns::PAR_DO)
                    .with_input("in", "a")
                    .with_output("out", "b"),
            )
            .add_root(
                "right",
                TransformNode::new("Right", urns::PAR_DO)
                    .with_input("in", "a")
                    .with_output("out", "c"),
            )
            .add_root(
                "join",
                TransformNode::new("Join", urns::PAR_DO)
                    .with_input("left", "b")
                    .with_input("right", "c")
                    .with_output("out", "d"),
            );

        let fused = fuse(graph, &known()).unwrap();
        assert_ne!(stage_of(&fused, "join"), stage_of(&fused, "left"));
        assert_ne!(stage_of(&fused, "join"), stage_of(&fused, "right"));
        assert!(fused.validate().is_ok());
    }

    #[test]
    fn stage_ports_cross_stage_boundaries() {
        let mut graph = DataflowGraph::new();
        for id in ["a", "b", "c"] {
            graph.add_collection(id, Collection::bounded());
        }
        graph
            .add_root(
                "impulse",
                TransformNode::new("Impulse", urns::IMPULSE).with_output("out", "a"),
            )
            .add_root(
                "map",
                TransformNode::new("Map", urns::PAR_DO)
                    .with_input("in", "a")
                    .with_output("out", "b"),
            )
            .add_root(
                "write",
                TransformNode::new("Write", urns::PAR_DO)
                    .with_input("in", "b")
                    .with_output("out", "c"),
            );

        let fused = fuse(graph, &known()).unwrap();
        let stage = fused.node("stage-0").unwrap();

        assert_eq!(stage.inputs.values().collect::<Vec<_>>(), vec![&CollectionId::from("a")]);
        assert_eq!(stage.outputs.values().collect::<Vec<_>>(), vec![&CollectionId::from("c")]);
        assert_eq!(fused.root_ids, vec![NodeId::from("impulse"), NodeId::from("stage-0")]);
    }

    #[test]
    fn process_step_is_a_stage_root() {
        let mut graph = DataflowGraph::new();
        for id in ["a", "b", "c"] {
            graph.add_collection(id, Collection::bounded());
        }
        graph
            .add_root(
                "impulse",
                TransformNode::new("Impulse", urns::IMPULSE).with_output("out", "a"),
            )
            .add_root(
                "split",
                TransformNode::new("Split", urns::SPLIT_AND_SIZE_RESTRICTIONS)
                    .with_input("in", "a")
                    .with_output("out", "b"),
            )
            .add_root(
                "process",
                TransformNode::new("Process", urns::PROCESS_SIZED_ELEMENTS_AND_RESTRICTIONS)
                    .with_input("in", "b")
                    .with_output("out", "c"),
            );

        let fused = fuse(graph, &known()).unwrap();
        assert_ne!(stage_of(&fused, "split"), stage_of(&fused, "process"));
    }
}
