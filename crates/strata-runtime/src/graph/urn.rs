//! Transform kind identifiers.

use std::borrow::Cow;

use derive_more::{Debug, Display};
use serde::{Deserialize, Serialize};

/// Identifies the kind of a transform node.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Debug, Display)]
#[debug("{_0}")]
#[display("{_0}")]
#[serde(transparent)]
pub struct Urn(Cow<'static, str>);

impl Urn {
    /// Creates a URN from a static string.
    #[inline]
    pub const fn from_static(urn: &'static str) -> Self {
        Self(Cow::Borrowed(urn))
    }

    /// Creates a URN from any string.
    #[inline]
    pub fn new(urn: impl Into<Cow<'static, str>>) -> Self {
        Self(urn.into())
    }

    /// Returns the URN as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Urn {
    fn from(urn: &'static str) -> Self {
        Self::from_static(urn)
    }
}

impl From<String> for Urn {
    fn from(urn: String) -> Self {
        Self(Cow::Owned(urn))
    }
}

/// Well-known transform URNs.
pub mod urns {
    use super::Urn;

    pub const IMPULSE: Urn = Urn::from_static("strata:transform:impulse:v1");
    pub const READ: Urn = Urn::from_static("strata:transform:read:v1");
    pub const PAR_DO: Urn = Urn::from_static("strata:transform:pardo:v1");
    pub const ASSIGN_WINDOWS: Urn = Urn::from_static("strata:transform:window_into:v1");
    pub const GROUP_BY_KEY: Urn = Urn::from_static("strata:transform:group_by_key:v1");
    pub const COMBINE_PER_KEY: Urn = Urn::from_static("strata:transform:combine_per_key:v1");
    pub const FLATTEN: Urn = Urn::from_static("strata:transform:flatten:v1");
    pub const RESHUFFLE: Urn = Urn::from_static("strata:transform:reshuffle:v1");

    /// Splittable ParDo, expanded by the preparer before fusion.
    pub const SPLITTABLE_PAR_DO: Urn = Urn::from_static("strata:transform:splittable_pardo:v1");
    pub const PAIR_WITH_RESTRICTION: Urn =
        Urn::from_static("strata:transform:sdf_pair_with_restriction:v1");
    pub const SPLIT_AND_SIZE_RESTRICTIONS: Urn =
        Urn::from_static("strata:transform:sdf_split_and_size_restrictions:v1");
    pub const PROCESS_SIZED_ELEMENTS_AND_RESTRICTIONS: Urn =
        Urn::from_static("strata:transform:sdf_process_sized_element_and_restrictions:v1");

    /// Marks a node produced by fusion.
    pub const EXECUTABLE_STAGE: Urn = Urn::from_static("strata:runner:executable_stage:v1");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_and_owned_urns_compare_equal() {
        let owned = Urn::new(String::from("strata:transform:impulse:v1"));
        assert_eq!(owned, urns::IMPULSE);
        assert_eq!(urns::IMPULSE.to_string(), "strata:transform:impulse:v1");
    }

    #[test]
    fn urns_deserialize_from_plain_strings() {
        let urn: Urn = serde_json::from_str("\"strata:transform:flatten:v1\"").unwrap();
        assert_eq!(urn, urns::FLATTEN);
    }
}
