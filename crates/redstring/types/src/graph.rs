//! Graphs and the entities placed inside them

use crate::ids::{EdgeId, GraphId, GroupId, InstanceId, PrototypeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Default color for new graphs.
pub const DEFAULT_GRAPH_COLOR: &str = "#800000";

/// Default color for new groups.
pub const DEFAULT_GROUP_COLOR: &str = "#8B0000";

/// A single placement of a prototype inside one graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInstance {
    pub id: InstanceId,
    pub prototype_id: PrototypeId,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

impl NodeInstance {
    pub fn new(id: InstanceId, prototype_id: PrototypeId, x: f64, y: f64) -> Self {
        Self {
            id,
            prototype_id,
            x,
            y,
            scale: 1.0,
        }
    }
}

/// Which endpoints of an edge carry an arrowhead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directionality {
    #[serde(default, deserialize_with = "deserialize_arrows")]
    pub arrows_toward: BTreeSet<InstanceId>,
}

impl Directionality {
    pub fn toward(id: InstanceId) -> Self {
        Self {
            arrows_toward: BTreeSet::from([id]),
        }
    }
}

/// Accepted wire shapes for `arrowsToward`: a list, an object keyed by id
/// (how a JS `Set` or map round-trips), or null.
#[derive(Deserialize)]
#[serde(untagged)]
enum ArrowsRepr {
    List(Vec<InstanceId>),
    Keyed(BTreeMap<InstanceId, serde_json::Value>),
}

fn deserialize_arrows<'de, D>(deserializer: D) -> Result<BTreeSet<InstanceId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<ArrowsRepr>::deserialize(deserializer)? {
        Some(ArrowsRepr::List(ids)) => ids.into_iter().collect(),
        Some(ArrowsRepr::Keyed(map)) => map.into_keys().collect(),
        None => BTreeSet::new(),
    })
}

fn deserialize_directionality<'de, D>(deserializer: D) -> Result<Directionality, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Directionality>::deserialize(deserializer)?.unwrap_or_default())
}

/// A connection between two instances of the same graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub source_id: InstanceId,
    pub destination_id: InstanceId,
    #[serde(default)]
    pub type_node_id: Option<PrototypeId>,
    #[serde(default, deserialize_with = "deserialize_directionality")]
    pub directionality: Directionality,
    #[serde(default)]
    pub definition_node_ids: Vec<PrototypeId>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Edge {
    pub fn new(id: EdgeId, source_id: InstanceId, destination_id: InstanceId) -> Self {
        Self {
            id,
            source_id,
            destination_id,
            type_node_id: Some(PrototypeId::base_connection()),
            directionality: Directionality::default(),
            definition_node_ids: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_type(mut self, type_node_id: PrototypeId) -> Self {
        self.type_node_id = Some(type_node_id);
        self
    }

    pub fn touches(&self, instance_id: &InstanceId) -> bool {
        &self.source_id == instance_id || &self.destination_id == instance_id
    }

    /// Every prototype id this edge refers to.
    pub fn referenced_prototypes(&self) -> impl Iterator<Item = &PrototypeId> {
        self.type_node_id.iter().chain(self.definition_node_ids.iter())
    }
}

/// A named, colored set of instances within one graph.
///
/// A group linked to a prototype is a node-group: its contents are also the
/// prototype's definition graph at `linked_definition_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default = "default_group_color")]
    pub color: String,
    #[serde(default)]
    pub member_instance_ids: BTreeSet<InstanceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_node_prototype_id: Option<PrototypeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_definition_index: Option<usize>,
}

impl Group {
    pub fn new(id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            color: DEFAULT_GROUP_COLOR.to_string(),
            member_instance_ids: BTreeSet::new(),
            linked_node_prototype_id: None,
            linked_definition_index: None,
        }
    }

    pub fn with_members(mut self, members: impl IntoIterator<Item = InstanceId>) -> Self {
        self.member_instance_ids = members.into_iter().collect();
        self
    }

    pub fn is_node_group(&self) -> bool {
        self.linked_node_prototype_id.is_some()
    }
}

/// A canvas of instances, groups and edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    pub id: GraphId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_graph_color")]
    pub color: String,
    #[serde(default = "default_directed")]
    pub directed: bool,
    #[serde(default)]
    pub instances: BTreeMap<InstanceId, NodeInstance>,
    #[serde(default)]
    pub groups: BTreeMap<GroupId, Group>,
    #[serde(default)]
    pub edge_ids: Vec<EdgeId>,
    #[serde(default)]
    pub defining_node_ids: Vec<PrototypeId>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Graph {
    pub fn new(id: GraphId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            color: DEFAULT_GRAPH_COLOR.to_string(),
            directed: true,
            instances: BTreeMap::new(),
            groups: BTreeMap::new(),
            edge_ids: Vec::new(),
            defining_node_ids: Vec::new(),
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

    /// Prototypes instantiated somewhere in this graph.
    pub fn instantiated_prototypes(&self) -> impl Iterator<Item = &PrototypeId> {
        self.instances.values().map(|i| &i.prototype_id)
    }

    /// Drop an edge id from the ordered edge list. Returns whether it was present.
    pub fn strip_edge(&mut self, edge_id: &EdgeId) -> bool {
        let before = self.edge_ids.len();
        self.edge_ids.retain(|e| e != edge_id);
        before != self.edge_ids.len()
    }

    /// Remove an instance from every group's member set.
    pub fn forget_member(&mut self, instance_id: &InstanceId) {
        for group in self.groups.values_mut() {
            group.member_instance_ids.remove(instance_id);
        }
    }
}

fn default_scale() -> f64 {
    1.0
}

fn default_directed() -> bool {
    true
}

fn default_graph_color() -> String {
    DEFAULT_GRAPH_COLOR.to_string()
}

fn default_group_color() -> String {
    DEFAULT_GROUP_COLOR.to_string()
}
