//! Dataflow graph representation.

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use super::{Boundedness, Collection, CollectionId, NodeId, TransformNode};
use crate::error::{Error, Result};

/// An executable unit: a leaf node and the primitives it runs.
pub(crate) type Unit = (NodeId, Vec<NodeId>);

/// A portable dataflow graph.
///
/// Nodes and collections are kept in ordered maps so that every traversal
/// is deterministic. Root ids list the top-level nodes in submission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataflowGraph {
    /// All nodes by id, including composites and fused primitives.
    #[serde(default)]
    pub nodes: BTreeMap<NodeId, TransformNode>,
    /// All collections by id.
    #[serde(default)]
    pub collections: BTreeMap<CollectionId, Collection>,
    /// Top-level nodes in submission order.
    #[serde(default)]
    pub root_ids: Vec<NodeId>,
}

impl DataflowGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a collection.
    pub fn add_collection(
        &mut self,
        id: impl Into<CollectionId>,
        collection: Collection,
    ) -> &mut Self {
        self.collections.insert(id.into(), collection);
        self
    }

    /// Adds or replaces a node without making it a root.
    pub fn add_node(&mut self, id: impl Into<NodeId>, node: TransformNode) -> &mut Self {
        self.nodes.insert(id.into(), node);
        self
    }

    /// Adds a node and appends it to the root ids.
    pub fn add_root(&mut self, id: impl Into<NodeId>, node: TransformNode) -> &mut Self {
        let id = id.into();
        self.root_ids.push(id.clone());
        self.nodes.insert(id, node);
        self
    }

    /// Returns a node by id.
    pub fn node<Q>(&self, id: &Q) -> Option<&TransformNode>
    where
        NodeId: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.nodes.get(id)
    }

    /// Returns a collection by id.
    pub fn collection<Q>(&self, id: &Q) -> Option<&Collection>
    where
        CollectionId: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.collections.get(id)
    }

    /// Returns the number of nodes in the node table.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the boundedness of a collection, bounded if unknown.
    pub fn boundedness<Q>(&self, id: &Q) -> Boundedness
    where
        CollectionId: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.collections
            .get(id)
            .map(|c| c.boundedness)
            .unwrap_or_default()
    }

    /// Returns true if any node was produced by fusion.
    pub fn has_executable_stage(&self) -> bool {
        self.nodes.values().any(TransformNode::is_stage)
    }

    /// Returns the executable leaves reachable from the roots, in
    /// depth-first definition order.
    ///
    /// Composites are expanded into their subtransforms; stages and
    /// primitives are leaves.
    pub fn leaves(&self) -> Result<Vec<NodeId>> {
        let mut seen = BTreeSet::new();
        let mut leaves = Vec::new();
        for root in &self.root_ids {
            self.collect_leaves(root, &mut seen, &mut leaves)?;
        }
        Ok(leaves)
    }

    fn collect_leaves(
        &self,
        id: &NodeId,
        seen: &mut BTreeSet<NodeId>,
        leaves: &mut Vec<NodeId>,
    ) -> Result<()> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| Error::invalid_graph(format!("unknown node {id}")))?;
        if !seen.insert(id.clone()) {
            return Err(Error::invalid_graph(format!(
                "node {id} is reachable more than once"
            )));
        }

        if node.is_stage() || !node.is_composite() {
            leaves.push(id.clone());
            return Ok(());
        }

        for child in &node.subtransforms {
            self.collect_leaves(child, seen, leaves)?;
        }
        Ok(())
    }

    /// Returns every executable leaf with the primitives it runs.
    pub(crate) fn units(&self) -> Result<Vec<Unit>> {
        self.leaves()?
            .into_iter()
            .map(|leaf| {
                let primitives = match self.nodes.get(&leaf).and_then(|n| n.stage.as_ref()) {
                    Some(stage) => {
                        for id in &stage.transforms {
                            if !self.nodes.contains_key(id) {
                                return Err(Error::invalid_graph(format!(
                                    "stage {leaf} references unknown node {id}"
                                )));
                            }
                        }
                        stage.transforms.clone()
                    }
                    None => vec![leaf.clone()],
                };
                Ok((leaf, primitives))
            })
            .collect()
    }

    /// Maps every produced collection to its producing primitive.
    fn producers(&self, units: &[Unit]) -> Result<BTreeMap<CollectionId, NodeId>> {
        let mut producers = BTreeMap::new();
        for id in units.iter().flat_map(|(_, primitives)| primitives) {
            let node = &self.nodes[id];
            for output in node.outputs.values() {
                if let Some(previous) = producers.insert(output.clone(), id.clone()) {
                    return Err(Error::invalid_graph(format!(
                        "collection {output} is produced by both {previous} and {id}"
                    )));
                }
            }
        }
        Ok(producers)
    }

    /// Validates the graph structure.
    ///
    /// Checks that there is at least one root, that every referenced node
    /// and collection exists, that every collection has exactly one
    /// producing primitive, and that the graph is acyclic.
    pub fn validate(&self) -> Result<()> {
        if self.root_ids.is_empty() {
            return Err(Error::invalid_graph("graph has no root nodes"));
        }

        for (id, node) in &self.nodes {
            for collection in node.inputs.values().chain(node.outputs.values()) {
                if !self.collections.contains_key(collection) {
                    return Err(Error::invalid_graph(format!(
                        "node {id} references unknown collection {collection}"
                    )));
                }
            }
            for child in &node.subtransforms {
                if !self.nodes.contains_key(child) {
                    return Err(Error::invalid_graph(format!(
                        "node {id} references unknown subtransform {child}"
                    )));
                }
            }
        }

        let units = self.units()?;
        let producers = self.producers(&units)?;
        if let Some(orphan) = self
            .collections
            .keys()
            .find(|id| !producers.contains_key(*id))
        {
            return Err(Error::invalid_graph(format!(
                "collection {orphan} has no producer"
            )));
        }

        self.order_units(&units, &producers).map(|_| ())
    }

    /// Returns the executable leaves in topological order.
    ///
    /// Ties between ready leaves are broken by node id, so the order is
    /// stable for a given graph.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        let units = self.units()?;
        let producers = self.producers(&units)?;
        self.order_units(&units, &producers)
    }

    /// Builds the dependency graph between executable units.
    ///
    /// Node `i` is `units[i]`. An edge runs from the unit producing a
    /// collection to every other unit consuming it. Inside a stage, a
    /// primitive must come after the primitives it consumes from.
    fn dependencies<'a>(
        &self,
        units: &'a [Unit],
        producers: &BTreeMap<CollectionId, NodeId>,
    ) -> Result<DiGraph<&'a NodeId, ()>> {
        let mut graph = DiGraph::with_capacity(units.len(), units.len());
        let mut position: HashMap<&NodeId, (NodeIndex, usize)> = HashMap::new();
        for (leaf, primitives) in units {
            let index = graph.add_node(leaf);
            for (step, id) in primitives.iter().enumerate() {
                position.insert(id, (index, step));
            }
        }

        for (leaf, primitives) in units {
            for (step, id) in primitives.iter().enumerate() {
                let consumer = position[id].0;
                for input in self.nodes[id].inputs.values() {
                    let Some(producer) = producers.get(input) else {
                        continue;
                    };
                    if producer == id {
                        return Err(Error::invalid_graph(format!(
                            "node {id} consumes its own output {input}"
                        )));
                    }
                    let (upstream, upstream_step) = position[producer];
                    if upstream != consumer {
                        graph.update_edge(upstream, consumer, ());
                    } else if upstream_step > step {
                        return Err(Error::invalid_graph(format!(
                            "stage {leaf} runs {id} before its producer {producer}"
                        )));
                    }
                }
            }
        }
        Ok(graph)
    }

    /// Orders units with Kahn's algorithm over the dependency graph.
    fn order_units(
        &self,
        units: &[Unit],
        producers: &BTreeMap<CollectionId, NodeId>,
    ) -> Result<Vec<NodeId>> {
        let graph = self.dependencies(units, producers)?;

        let mut in_degree: Vec<usize> = graph
            .node_indices()
            .map(|index| graph.neighbors_directed(index, Direction::Incoming).count())
            .collect();
        let mut ready: BTreeSet<(&NodeId, NodeIndex)> = graph
            .node_indices()
            .filter(|index| in_degree[index.index()] == 0)
            .map(|index| (graph[index], index))
            .collect();

        let mut order = Vec::with_capacity(units.len());
        while let Some((id, index)) = ready.pop_first() {
            order.push(id.clone());
            for next in graph.neighbors_directed(index, Direction::Outgoing) {
                let degree = &mut in_degree[next.index()];
                *degree -= 1;
                if *degree == 0 {
                    ready.insert((graph[next], next));
                }
            }
        }

        if order.len() != units.len() {
            return Err(Error::invalid_graph("graph contains a cycle"));
        }
        Ok(order)
    }

    /// Returns true if any collection touched by an executable node is
    /// unbounded.
    pub fn has_unbounded_collections(&self) -> bool {
        let Ok(units) = self.units() else {
            return self
                .collections
                .values()
                .any(|c| c.boundedness.is_unbounded());
        };

        units
            .iter()
            .flat_map(|(_, primitives)| primitives)
            .filter_map(|id| self.nodes.get(id))
            .flat_map(|node| node.inputs.values().chain(node.outputs.values()))
            .any(|id| self.boundedness(id).is_unbounded())
    }

    /// Removes collections no node refers to.
    pub fn prune_unreferenced_collections(&mut self) {
        let referenced: BTreeSet<&CollectionId> = self
            .nodes
            .values()
            .flat_map(|node| node.inputs.values().chain(node.outputs.values()))
            .collect();
        let unreferenced: Vec<CollectionId> = self
            .collections
            .keys()
            .filter(|id| !referenced.contains(id))
            .cloned()
            .collect();
        for id in unreferenced {
            self.collections.remove(&id);
        }
    }

    /// Returns the ids of the nodes consuming a collection.
    pub fn consumers(&self, collection: &CollectionId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.is_primitive())
            .filter(|(_, node)| node.inputs.values().any(|input| input == collection))
            .map(|(id, _)| id.clone())
            .collect()
    }
}
