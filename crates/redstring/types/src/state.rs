//! The root store snapshot
//!
//! Every entity map holds `Arc`-wrapped values, so cloning a snapshot to
//! build a draft copies only the map spines. Untouched entities stay shared
//! between the committed snapshot and the draft.

use crate::graph::{Edge, Graph, NodeInstance};
use crate::ids::{EdgeId, GraphId, GroupId, InstanceId, PrototypeId};
use crate::prototype::{EdgePrototype, NodePrototype};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// What a right-panel tab shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TabTarget {
    Home,
    #[serde(rename_all = "camelCase")]
    Node { node_id: PrototypeId },
}

/// A right-panel tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelTab {
    #[serde(flatten)]
    pub target: TabTarget,
    #[serde(default)]
    pub is_active: bool,
}

impl PanelTab {
    pub fn home() -> Self {
        Self {
            target: TabTarget::Home,
            is_active: true,
        }
    }

    pub fn node(node_id: PrototypeId) -> Self {
        Self {
            target: TabTarget::Node { node_id },
            is_active: false,
        }
    }

    pub fn node_id(&self) -> Option<&PrototypeId> {
        match &self.target {
            TabTarget::Node { node_id } => Some(node_id),
            TabTarget::Home => None,
        }
    }
}

/// A soft-deleted instance awaiting expiry or restoration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDeletion {
    pub instance_id: InstanceId,
    pub graph_id: GraphId,
    /// Wall-clock time of the soft delete, in milliseconds since the epoch.
    pub timestamp_ms: i64,
    pub instance: NodeInstance,
    /// Edges touching the instance at deletion time.
    pub connected_edges: Vec<Edge>,
    /// Index of each connected edge in the graph's edge list at deletion time.
    #[serde(default)]
    pub edge_positions: Vec<usize>,
    #[serde(default)]
    pub group_memberships: Vec<GroupId>,
}

impl PendingDeletion {
    pub fn is_expired(&self, now_ms: i64, grace_period_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp_ms) > grace_period_ms as i64
    }
}

/// Complete, immutable view of the store at one commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreState {
    pub graphs: BTreeMap<GraphId, Arc<Graph>>,
    pub node_prototypes: BTreeMap<PrototypeId, Arc<NodePrototype>>,
    pub edge_prototypes: BTreeMap<PrototypeId, Arc<EdgePrototype>>,
    pub edges: BTreeMap<EdgeId, Arc<Edge>>,
    pub pending_deletions: BTreeMap<InstanceId, Arc<PendingDeletion>>,
    pub open_graph_ids: Vec<GraphId>,
    pub active_graph_id: Option<GraphId>,
    pub expanded_graph_ids: BTreeSet<GraphId>,
    pub saved_node_ids: BTreeSet<PrototypeId>,
    pub saved_graph_ids: BTreeSet<GraphId>,
    pub right_panel_tabs: Vec<PanelTab>,
    pub active_definition_node_id: Option<PrototypeId>,
}

impl StoreState {
    /// A fresh store: the two root prototypes and a home tab.
    pub fn seeded() -> Self {
        let mut state = Self::default();
        state.ensure_roots();
        state.right_panel_tabs.push(PanelTab::home());
        state
    }

    /// Re-insert the root prototypes if a snapshot lacks them.
    pub fn ensure_roots(&mut self) {
        let thing = NodePrototype::base_thing();
        self.node_prototypes
            .entry(thing.id.clone())
            .or_insert_with(|| Arc::new(thing));
        let connection = EdgePrototype::base_connection();
        self.edge_prototypes
            .entry(connection.id.clone())
            .or_insert_with(|| Arc::new(connection));
    }

    pub fn graph(&self, id: &GraphId) -> Option<&Graph> {
        self.graphs.get(id).map(Arc::as_ref)
    }

    pub fn node_prototype(&self, id: &PrototypeId) -> Option<&NodePrototype> {
        self.node_prototypes.get(id).map(Arc::as_ref)
    }

    pub fn edge_prototype(&self, id: &PrototypeId) -> Option<&EdgePrototype> {
        self.edge_prototypes.get(id).map(Arc::as_ref)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id).map(Arc::as_ref)
    }

    /// True if the id names a node or an edge prototype.
    pub fn has_prototype(&self, id: &PrototypeId) -> bool {
        self.node_prototypes.contains_key(id) || self.edge_prototypes.contains_key(id)
    }

    /// The `type_node_id` of a node or edge prototype.
    pub fn type_of(&self, id: &PrototypeId) -> Option<&PrototypeId> {
        match self.node_prototypes.get(id) {
            Some(p) => p.type_node_id.as_ref(),
            None => self.edge_prototypes.get(id)?.type_node_id.as_ref(),
        }
    }

    pub fn prototype_count(&self) -> usize {
        self.node_prototypes.len() + self.edge_prototypes.len()
    }

    /// Locate an instance by id across all graphs.
    pub fn find_instance(&self, id: &InstanceId) -> Option<(&GraphId, &NodeInstance)> {
        self.graphs
            .iter()
            .find_map(|(gid, g)| g.instances.get(id).map(|inst| (gid, inst)))
    }

    pub fn instance_exists(&self, id: &InstanceId) -> bool {
        self.find_instance(id).is_some()
    }

    /// The graph whose edge list holds this edge.
    pub fn graph_owning_edge(&self, edge_id: &EdgeId) -> Option<&GraphId> {
        self.graphs
            .iter()
            .find(|(_, g)| g.edge_ids.contains(edge_id))
            .map(|(gid, _)| gid)
    }

    /// Edges of a graph touching the given instance, in edge-list order.
    pub fn edges_touching(&self, graph_id: &GraphId, instance_id: &InstanceId) -> Vec<&Edge> {
        let Some(graph) = self.graph(graph_id) else {
            return Vec::new();
        };
        graph
            .edge_ids
            .iter()
            .filter_map(|eid| self.edge(eid))
            .filter(|e| e.touches(instance_id))
            .collect()
    }
}
