//! Transform nodes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Boundedness, CollectionId, NodeId, Urn, urns};

/// Payload of a node produced by fusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagePayload {
    /// Fused primitive nodes in execution order.
    pub transforms: Vec<NodeId>,
    /// Boundedness shared by every fused node.
    pub boundedness: Boundedness,
}

/// A transform node in a dataflow graph.
///
/// Inputs and outputs map local tags to collection ids. A node with
/// subtransforms is a composite; only its leaves are executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformNode {
    /// Human-readable name, unique within the submitted graph.
    pub unique_name: String,
    /// Kind of the transform.
    pub urn: Urn,
    /// Consumed collections keyed by local tag.
    #[serde(default)]
    pub inputs: BTreeMap<String, CollectionId>,
    /// Produced collections keyed by local tag.
    #[serde(default)]
    pub outputs: BTreeMap<String, CollectionId>,
    /// Child nodes of a composite, in definition order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtransforms: Vec<NodeId>,
    /// Forces the node to start a new stage.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fusion_break: bool,
    /// Opaque transform configuration, interpreted by the translator.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
    /// Set on nodes produced by fusion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<StagePayload>,
}

impl TransformNode {
    /// Creates a primitive node with no inputs or outputs.
    pub fn new(unique_name: impl Into<String>, urn: impl Into<Urn>) -> Self {
        Self {
            unique_name: unique_name.into(),
            urn: urn.into(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            subtransforms: Vec::new(),
            fusion_break: false,
            payload: serde_json::Value::Null,
            stage: None,
        }
    }

    /// Adds a consumed collection under the given tag.
    pub fn with_input(mut self, tag: impl Into<String>, id: impl Into<CollectionId>) -> Self {
        self.inputs.insert(tag.into(), id.into());
        self
    }

    /// Adds a produced collection under the given tag.
    pub fn with_output(mut self, tag: impl Into<String>, id: impl Into<CollectionId>) -> Self {
        self.outputs.insert(tag.into(), id.into());
        self
    }

    /// Sets the children of a composite node.
    pub fn with_subtransforms<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeId>,
    {
        self.subtransforms = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Marks the node as a fusion boundary.
    pub fn with_fusion_break(mut self) -> Self {
        self.fusion_break = true;
        self
    }

    /// Sets the opaque transform configuration.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Returns true if the node has children.
    #[inline]
    pub fn is_composite(&self) -> bool {
        !self.subtransforms.is_empty()
    }

    /// Returns true if the node was produced by fusion.
    #[inline]
    pub fn is_stage(&self) -> bool {
        self.stage.is_some() || self.urn == urns::EXECUTABLE_STAGE
    }

    /// Returns true if the node is executed directly.
    #[inline]
    pub fn is_primitive(&self) -> bool {
        !self.is_composite() && !self.is_stage()
    }

    /// Returns the main input: the `main` tag if present, else the first input.
    pub fn main_input(&self) -> Option<&CollectionId> {
        self.inputs
            .get("main")
            .or_else(|| self.inputs.values().next())
    }
}
