//! Data collections flowing between transforms.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Whether a collection has a finite number of elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Boundedness {
    /// The collection is finite.
    #[default]
    Bounded,
    /// The collection may grow without limit.
    Unbounded,
}

impl Boundedness {
    /// Returns true for unbounded collections.
    #[inline]
    pub const fn is_unbounded(self) -> bool {
        matches!(self, Self::Unbounded)
    }
}

/// A data collection in a dataflow graph.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    /// Optional human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Boundedness of the collection.
    #[serde(default)]
    pub boundedness: Boundedness,
}

impl Collection {
    /// Creates a bounded collection.
    pub fn bounded() -> Self {
        Self::default()
    }

    /// Creates an unbounded collection.
    pub fn unbounded() -> Self {
        Self {
            name: None,
            boundedness: Boundedness::Unbounded,
        }
    }

    /// Sets the collection name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
