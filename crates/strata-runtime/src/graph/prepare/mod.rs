//! Graph preparation: splittable expansion, native protection and fusion.

mod expand;
mod fuse;
mod native;

use std::collections::BTreeSet;

use super::{DataflowGraph, TRACING_TARGET, Urn};
use crate::error::Result;

/// Rewrites a submitted graph into executable stages.
///
/// Preparation runs in a fixed order: splittable ParDo nodes are expanded,
/// nodes the translator handles natively are collapsed to opaque leaves,
/// and the remaining primitives are greedily fused. A graph that already
/// contains an executable stage is returned unchanged.
#[derive(Debug, Clone, Default)]
pub struct GraphPreparer {
    known_urns: BTreeSet<Urn>,
}

impl GraphPreparer {
    /// Creates a preparer protecting the given native URNs.
    pub fn new(known_urns: impl IntoIterator<Item = Urn>) -> Self {
        Self {
            known_urns: known_urns.into_iter().collect(),
        }
    }

    /// Returns the URNs treated as native.
    pub fn known_urns(&self) -> &BTreeSet<Urn> {
        &self.known_urns
    }

    /// Prepares a graph for translation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGraph`] if the graph is malformed or cyclic.
    ///
    /// [`Error::InvalidGraph`]: crate::Error::InvalidGraph
    pub fn prepare(&self, graph: DataflowGraph) -> Result<DataflowGraph> {
        graph.validate()?;

        if graph.has_executable_stage() {
            tracing::debug!(
                target: TRACING_TARGET,
                nodes = graph.node_count(),
                "Graph already fused, skipping preparation"
            );
            return Ok(graph);
        }

        let graph = expand::expand_splittable(graph)?;
        let graph = native::protect_natives(graph, &self.known_urns);
        let graph = fuse::fuse(graph, &self.known_urns)?;

        tracing::info!(
            target: TRACING_TARGET,
            roots = graph.root_ids.len(),
            stages = graph.nodes.values().filter(|n| n.is_stage()).count(),
            "Graph prepared"
        );

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Collection, NodeId, TransformNode, urns};

    fn preparer() -> GraphPreparer {
        GraphPreparer::new([urns::GROUP_BY_KEY, urns::IMPULSE])
    }

    /// impulse -> map -> filter -> gbk -> format
    fn wordcount() -> DataflowGraph {
        let mut graph = DataflowGraph::new();
        for id in ["impulse.out", "map.out", "filter.out", "gbk.out", "format.out"] {
            graph.add_collection(id, Collection::bounded());
        }
        graph
            .add_root(
                "impulse",
                TransformNode::new("Impulse", urns::IMPULSE).with_output("out", "impulse.out"),
            )
            .add_root(
                "map",
                TransformNode::new("Map", urns::PAR_DO)
                    .with_input("in", "impulse.out")
                    .with_output("out", "map.out"),
            )
            .add_root(
                "filter",
                TransformNode::new("Filter", urns::PAR_DO)
                    .with_input("in", "map.out")
                    .with_output("out", "filter.out"),
            )
            .add_root(
                "gbk",
                TransformNode::new("GroupByKey", urns::GROUP_BY_KEY)
                    .with_input("in", "filter.out")
                    .with_output("out", "gbk.out"),
            )
            .add_root(
                "format",
                TransformNode::new("Format", urns::PAR_DO)
                    .with_input("in", "gbk.out")
                    .with_output("out", "format.out"),
            );
        graph
    }

    fn stage_members(graph: &DataflowGraph) -> Vec<Vec<String>> {
        graph
            .root_ids
            .iter()
            .filter_map(|id| graph.node(id)?.stage.as_ref())
            .map(|stage| stage.transforms.iter().map(|t| t.to_string()).collect())
            .collect()
    }

    #[test]
    fn fuses_chains_between_natives() {
        let prepared = preparer().prepare(wordcount()).unwrap();

        assert_eq!(stage_members(&prepared), vec![
            vec!["map".to_owned(), "filter".to_owned()],
            vec!["format".to_owned()],
        ]);
        assert!(prepared.root_ids.contains(&NodeId::from("impulse")));
        assert!(prepared.root_ids.contains(&NodeId::from("gbk")));
        assert!(prepared.validate().is_ok());
    }

    #[test]
    fn preparation_is_idempotent() {
        let once = preparer().prepare(wordcount()).unwrap();
        let twice = preparer().prepare(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn preparation_is_deterministic() {
        let first = preparer().prepare(wordcount()).unwrap();
        let second = preparer().prepare(wordcount()).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn rejects_invalid_graphs() {
        let mut graph = wordcount();
        graph.root_ids.push(NodeId::from("missing"));
        assert!(preparer().prepare(graph).is_err());
    }
}
