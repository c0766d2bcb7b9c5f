//! Read-only views over a snapshot
//!
//! Selectors never mutate and never fail; a missing entity yields `None` or
//! an empty collection.

use crate::integrity::IntegrityGuard;
use redstring_types::{
    Edge, EdgePrototype, Graph, GraphId, InstanceId, NodeInstance, NodePrototype, PendingDeletion,
    PrototypeId, StoreState,
};

/// An instance joined with its prototype.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HydratedNode<'a> {
    pub instance: &'a NodeInstance,
    pub prototype: &'a NodePrototype,
}

impl HydratedNode<'_> {
    pub fn name(&self) -> &str {
        &self.prototype.name
    }

    pub fn color(&self) -> &str {
        &self.prototype.color
    }
}

/// A prototype from either map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrototypeRef<'a> {
    Node(&'a NodePrototype),
    Edge(&'a EdgePrototype),
}

impl PrototypeRef<'_> {
    pub fn id(&self) -> &PrototypeId {
        match self {
            Self::Node(p) => &p.id,
            Self::Edge(p) => &p.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Node(p) => &p.name,
            Self::Edge(p) => &p.name,
        }
    }
}

pub fn graph_by_id<'a>(state: &'a StoreState, graph_id: &GraphId) -> Option<&'a Graph> {
    state.graph(graph_id)
}

/// Edges of a graph in edge-list order.
pub fn edges_for_graph<'a>(state: &'a StoreState, graph_id: &GraphId) -> Vec<&'a Edge> {
    state
        .graph(graph_id)
        .map(|g| g.edge_ids.iter().filter_map(|id| state.edge(id)).collect())
        .unwrap_or_default()
}

/// Instances of a graph joined with their prototypes, in id order. Instances
/// whose prototype is gone are skipped.
pub fn hydrated_instances<'a>(state: &'a StoreState, graph_id: &GraphId) -> Vec<HydratedNode<'a>> {
    let Some(graph) = state.graph(graph_id) else {
        return Vec::new();
    };
    graph
        .instances
        .values()
        .filter_map(|instance| {
            state
                .node_prototype(&instance.prototype_id)
                .map(|prototype| HydratedNode { instance, prototype })
        })
        .collect()
}

/// `id` followed by its ancestors, nearest first. Empty if `id` is unknown.
pub fn type_hierarchy(state: &StoreState, id: &PrototypeId) -> Vec<PrototypeId> {
    if !state.has_prototype(id) {
        return Vec::new();
    }
    let mut hierarchy = vec![id.clone()];
    hierarchy.extend(IntegrityGuard::type_chain(state, id));
    hierarchy
}

pub fn prototype_by_id<'a>(state: &'a StoreState, id: &PrototypeId) -> Option<PrototypeRef<'a>> {
    state
        .node_prototype(id)
        .map(PrototypeRef::Node)
        .or_else(|| state.edge_prototype(id).map(PrototypeRef::Edge))
}

/// Open graphs in tab order.
pub fn open_graphs(state: &StoreState) -> Vec<&Graph> {
    state
        .open_graph_ids
        .iter()
        .filter_map(|id| state.graph(id))
        .collect()
}

pub fn pending_deletion<'a>(
    state: &'a StoreState,
    instance_id: &InstanceId,
) -> Option<&'a PendingDeletion> {
    state.pending_deletions.get(instance_id).map(|p| p.as_ref())
}
