//! Node and edge prototypes
//!
//! A prototype is the reusable template (name, color, description) that
//! instances point at. Prototypes form a type hierarchy through
//! `type_node_id` and may be expanded by one or more definition graphs.

use crate::ids::{GraphId, PrototypeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default color for new node prototypes.
pub const DEFAULT_NODE_COLOR: &str = "#800000";

/// Default color for new edge prototypes.
pub const DEFAULT_EDGE_COLOR: &str = "#000000";

/// A typed statement about a prototype, carried in its semantic metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub predicate: String,
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Semantic-web annotations attached to a prototype.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SemanticMetadata {
    pub external_links: Vec<String>,
    pub equivalent_classes: Vec<String>,
    pub relationships: Vec<Relationship>,
    pub confidence: Option<f64>,
}

impl SemanticMetadata {
    pub fn is_empty(&self) -> bool {
        self.external_links.is_empty()
            && self.equivalent_classes.is_empty()
            && self.relationships.is_empty()
            && self.confidence.is_none()
    }
}

/// Reusable node template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePrototype {
    pub id: PrototypeId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_node_color")]
    pub color: String,
    #[serde(default)]
    pub type_node_id: Option<PrototypeId>,
    #[serde(default)]
    pub definition_graph_ids: Vec<GraphId>,
    #[serde(default)]
    pub semantic: SemanticMetadata,
    /// Generalization/specialization sequences keyed by dimension name.
    #[serde(default)]
    pub abstraction_chains: BTreeMap<String, Vec<PrototypeId>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl NodePrototype {
    pub fn new(id: PrototypeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            color: DEFAULT_NODE_COLOR.to_string(),
            type_node_id: None,
            definition_graph_ids: Vec::new(),
            semantic: SemanticMetadata::default(),
            abstraction_chains: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn with_type(mut self, type_node_id: PrototypeId) -> Self {
        self.type_node_id = Some(type_node_id);
        self
    }

    /// The root "Thing" prototype every fresh store is seeded with.
    pub fn base_thing() -> Self {
        Self::new(PrototypeId::base_thing(), "Thing")
            .with_description(
                "The most general type. Every node type ultimately derives from Thing.",
            )
            .with_color(DEFAULT_NODE_COLOR)
    }
}

/// Reusable connection template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgePrototype {
    pub id: PrototypeId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_edge_color")]
    pub color: String,
    #[serde(default)]
    pub type_node_id: Option<PrototypeId>,
    #[serde(default)]
    pub definition_graph_ids: Vec<GraphId>,
    #[serde(default)]
    pub semantic: SemanticMetadata,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl EdgePrototype {
    pub fn new(id: PrototypeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            color: DEFAULT_EDGE_COLOR.to_string(),
            type_node_id: None,
            definition_graph_ids: Vec::new(),
            semantic: SemanticMetadata::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// The root "Connection" prototype every fresh store is seeded with.
    pub fn base_connection() -> Self {
        Self::new(PrototypeId::base_connection(), "Connection")
            .with_description("The most general connection type.")
    }
}

fn default_node_color() -> String {
    DEFAULT_NODE_COLOR.to_string()
}

fn default_edge_color() -> String {
    DEFAULT_EDGE_COLOR.to_string()
}
