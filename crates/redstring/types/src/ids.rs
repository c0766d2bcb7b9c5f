//! Strongly-typed identifiers for graph store entities
//!
//! Ids are opaque strings so that snapshots produced elsewhere (imports,
//! agents) can carry their own identifiers. Freshly generated ids are UUID v4.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Unique identifier for a graph
    GraphId
);

string_id!(
    /// Unique identifier for a node or edge prototype
    ///
    /// Node and edge prototypes share one id space: an edge's type may name
    /// either kind.
    PrototypeId
);

string_id!(
    /// Unique identifier for a node instance (unique across all graphs)
    InstanceId
);

string_id!(
    /// Unique identifier for an edge
    EdgeId
);

string_id!(
    /// Unique identifier for a group within a graph
    GroupId
);

/// Id of the root node prototype ("Thing").
pub const BASE_THING_PROTOTYPE_ID: &str = "base-thing-prototype";

/// Id of the root edge prototype ("Connection").
pub const BASE_CONNECTION_PROTOTYPE_ID: &str = "base-connection-prototype";

impl PrototypeId {
    pub fn base_thing() -> Self {
        Self::new(BASE_THING_PROTOTYPE_ID)
    }

    pub fn base_connection() -> Self {
        Self::new(BASE_CONNECTION_PROTOTYPE_ID)
    }

    /// True for the two permanently untyped root prototypes.
    pub fn is_root(&self) -> bool {
        self.0 == BASE_THING_PROTOTYPE_ID || self.0 == BASE_CONNECTION_PROTOTYPE_ID
    }
}
