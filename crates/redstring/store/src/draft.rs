//! Copy-on-write mutation drafts
//!
//! A [`Draft`] starts as a shallow clone of the committed snapshot. Entity
//! accessors go through `Arc::make_mut`, so only the entities a mutation
//! actually touches are copied; everything else stays shared with the
//! snapshot readers hold. The store swaps the finished draft in as the new
//! root on success and simply drops it on failure.

use crate::error::ValidationError;
use redstring_types::{
    ChangeContext, Edge, EdgeId, EdgePrototype, Graph, GraphId, InstanceId, NodeInstance,
    NodePrototype, PrototypeId, StoreState, TargetKind,
};
use std::fmt;
use std::sync::Arc;

/// An uncommitted working copy of the store.
pub struct Draft {
    state: StoreState,
    operation: &'static str,
    changes: Vec<ChangeContext>,
}

impl Draft {
    pub(crate) fn new(base: &StoreState, operation: &'static str) -> Self {
        Self {
            state: base.clone(),
            operation,
            changes: Vec::new(),
        }
    }

    /// Name of the operation this draft is applying.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn state(&self) -> &StoreState {
        &self.state
    }

    /// Mutable access to indices and maps. Entity values should be changed
    /// through the `*_mut` accessors so untouched entities stay shared.
    pub fn state_mut(&mut self) -> &mut StoreState {
        &mut self.state
    }

    /// Tag a change context for the current operation.
    pub fn record(&mut self, target: TargetKind, id: impl fmt::Display) {
        self.changes
            .push(ChangeContext::new(self.operation, target).with_target_id(id));
    }

    pub fn changes(&self) -> &[ChangeContext] {
        &self.changes
    }

    pub(crate) fn into_parts(self) -> (StoreState, Vec<ChangeContext>) {
        (self.state, self.changes)
    }

    // ── lookups ─────────────────────────────────────────────────────────

    pub fn require_graph(&self, id: &GraphId) -> Result<&Graph, ValidationError> {
        self.state
            .graph(id)
            .ok_or_else(|| ValidationError::GraphNotFound(id.clone()))
    }

    pub fn require_node_prototype(
        &self,
        id: &PrototypeId,
    ) -> Result<&NodePrototype, ValidationError> {
        self.state
            .node_prototype(id)
            .ok_or_else(|| ValidationError::PrototypeNotFound(id.clone()))
    }

    pub fn require_edge(&self, id: &EdgeId) -> Result<&Edge, ValidationError> {
        self.state
            .edge(id)
            .ok_or_else(|| ValidationError::EdgeNotFound(id.clone()))
    }

    pub fn require_instance(
        &self,
        graph_id: &GraphId,
        instance_id: &InstanceId,
    ) -> Result<&NodeInstance, ValidationError> {
        self.require_graph(graph_id)?
            .instances
            .get(instance_id)
            .ok_or_else(|| ValidationError::InstanceNotFound(instance_id.clone()))
    }

    /// Instance ids are unique across graphs and pending deletions.
    pub fn instance_id_taken(&self, id: &InstanceId) -> bool {
        self.state.instance_exists(id) || self.state.pending_deletions.contains_key(id)
    }

    // ── copy-on-write accessors ─────────────────────────────────────────

    pub fn graph_mut(&mut self, id: &GraphId) -> Result<&mut Graph, ValidationError> {
        self.state
            .graphs
            .get_mut(id)
            .map(Arc::make_mut)
            .ok_or_else(|| ValidationError::GraphNotFound(id.clone()))
    }

    pub fn node_prototype_mut(
        &mut self,
        id: &PrototypeId,
    ) -> Result<&mut NodePrototype, ValidationError> {
        self.state
            .node_prototypes
            .get_mut(id)
            .map(Arc::make_mut)
            .ok_or_else(|| ValidationError::PrototypeNotFound(id.clone()))
    }

    pub fn edge_prototype_mut(
        &mut self,
        id: &PrototypeId,
    ) -> Result<&mut EdgePrototype, ValidationError> {
        self.state
            .edge_prototypes
            .get_mut(id)
            .map(Arc::make_mut)
            .ok_or_else(|| ValidationError::PrototypeNotFound(id.clone()))
    }

    pub fn edge_mut(&mut self, id: &EdgeId) -> Result<&mut Edge, ValidationError> {
        self.state
            .edges
            .get_mut(id)
            .map(Arc::make_mut)
            .ok_or_else(|| ValidationError::EdgeNotFound(id.clone()))
    }

    // ── structural helpers ──────────────────────────────────────────────

    pub fn insert_graph(&mut self, graph: Graph) {
        self.record(TargetKind::Graph, &graph.id);
        self.state.graphs.insert(graph.id.clone(), Arc::new(graph));
    }

    pub fn insert_node_prototype(&mut self, prototype: NodePrototype) {
        self.record(TargetKind::NodePrototype, &prototype.id);
        self.state
            .node_prototypes
            .insert(prototype.id.clone(), Arc::new(prototype));
    }

    pub fn insert_edge_prototype(&mut self, prototype: EdgePrototype) {
        self.record(TargetKind::EdgePrototype, &prototype.id);
        self.state
            .edge_prototypes
            .insert(prototype.id.clone(), Arc::new(prototype));
    }

    /// Register an edge globally and append it to the graph's edge list.
    pub fn insert_edge(&mut self, graph_id: &GraphId, edge: Edge) -> Result<(), ValidationError> {
        self.graph_mut(graph_id)?.edge_ids.push(edge.id.clone());
        self.record(TargetKind::Edge, &edge.id);
        self.state.edges.insert(edge.id.clone(), Arc::new(edge));
        Ok(())
    }

    /// Remove an edge from the global map and from every graph edge list.
    pub fn remove_edge(&mut self, edge_id: &EdgeId) -> Option<Edge> {
        let removed = self.state.edges.remove(edge_id).map(Arc::unwrap_or_clone);
        for graph in self.state.graphs.values_mut() {
            if graph.edge_ids.contains(edge_id) {
                Arc::make_mut(graph).strip_edge(edge_id);
            }
        }
        if removed.is_some() {
            self.record(TargetKind::Edge, edge_id);
        }
        removed
    }

    /// Hard-delete an instance together with every edge touching it and its
    /// group memberships. Returns the instance and the removed edges.
    pub fn remove_instance(
        &mut self,
        graph_id: &GraphId,
        instance_id: &InstanceId,
    ) -> Result<(NodeInstance, Vec<Edge>), ValidationError> {
        self.require_instance(graph_id, instance_id)?;
        let touching: Vec<EdgeId> = self
            .state
            .edges_touching(graph_id, instance_id)
            .into_iter()
            .map(|e| e.id.clone())
            .collect();

        let mut removed_edges = Vec::with_capacity(touching.len());
        for edge_id in &touching {
            if let Some(edge) = self.remove_edge(edge_id) {
                removed_edges.push(edge);
            }
        }

        let graph = self.graph_mut(graph_id)?;
        let instance = graph
            .instances
            .remove(instance_id)
            .ok_or_else(|| ValidationError::InstanceNotFound(instance_id.clone()))?;
        graph.forget_member(instance_id);
        self.record(TargetKind::Instance, instance_id);
        Ok((instance, removed_edges))
    }

    /// Detach a definition graph from a prototype, both directions, and
    /// re-index node-groups that point into the prototype's definition list.
    pub fn detach_definition(&mut self, prototype_id: &PrototypeId, graph_id: &GraphId) {
        let mut removed_index = None;
        if let Some(proto) = self.state.node_prototypes.get_mut(prototype_id) {
            if let Some(pos) = proto.definition_graph_ids.iter().position(|g| g == graph_id) {
                Arc::make_mut(proto).definition_graph_ids.remove(pos);
                removed_index = Some(pos);
            }
        } else if let Some(proto) = self.state.edge_prototypes.get_mut(prototype_id) {
            if proto.definition_graph_ids.contains(graph_id) {
                Arc::make_mut(proto).definition_graph_ids.retain(|g| g != graph_id);
            }
        }

        if let Some(graph) = self.state.graphs.get_mut(graph_id) {
            if graph.defining_node_ids.contains(prototype_id) {
                Arc::make_mut(graph)
                    .defining_node_ids
                    .retain(|p| p != prototype_id);
            }
        }

        if let Some(removed) = removed_index {
            self.reindex_node_groups(prototype_id, removed);
        }
    }

    fn reindex_node_groups(&mut self, prototype_id: &PrototypeId, removed: usize) {
        for graph in self.state.graphs.values_mut() {
            let affected = graph
                .groups
                .values()
                .any(|g| g.linked_node_prototype_id.as_ref() == Some(prototype_id));
            if !affected {
                continue;
            }
            for group in Arc::make_mut(graph).groups.values_mut() {
                if group.linked_node_prototype_id.as_ref() != Some(prototype_id) {
                    continue;
                }
                match group.linked_definition_index {
                    Some(i) if i == removed => group.linked_definition_index = None,
                    Some(i) if i > removed => group.linked_definition_index = Some(i - 1),
                    _ => {}
                }
            }
        }
    }

    /// Drop a graph with its edges and strip it from every index.
    pub fn remove_graph(&mut self, graph_id: &GraphId) -> Option<Graph> {
        let defining: Vec<PrototypeId> = self.state.graph(graph_id)?.defining_node_ids.clone();
        for prototype_id in &defining {
            self.detach_definition(prototype_id, graph_id);
        }
        // Back-references that were only one-sided.
        let listing: Vec<PrototypeId> = self
            .state
            .node_prototypes
            .values()
            .filter(|p| p.definition_graph_ids.contains(graph_id))
            .map(|p| p.id.clone())
            .chain(
                self.state
                    .edge_prototypes
                    .values()
                    .filter(|p| p.definition_graph_ids.contains(graph_id))
                    .map(|p| p.id.clone()),
            )
            .collect();
        for prototype_id in &listing {
            self.detach_definition(prototype_id, graph_id);
        }

        let graph = Arc::unwrap_or_clone(self.state.graphs.remove(graph_id)?);
        for edge_id in &graph.edge_ids {
            self.state.edges.remove(edge_id);
        }

        let state = &mut self.state;
        state.open_graph_ids.retain(|g| g != graph_id);
        state.expanded_graph_ids.remove(graph_id);
        state.saved_graph_ids.remove(graph_id);
        if state.active_graph_id.as_ref() == Some(graph_id) {
            state.active_graph_id = state.open_graph_ids.first().cloned();
        }
        state.pending_deletions.retain(|_, p| &p.graph_id != graph_id);

        self.record(TargetKind::Graph, graph_id);
        Some(graph)
    }

    /// Remove a node prototype and scrub it from indices and chains. Callers
    /// are responsible for references held by surviving entities.
    pub fn remove_node_prototype(&mut self, prototype_id: &PrototypeId) -> Option<NodePrototype> {
        let removed = self
            .state
            .node_prototypes
            .remove(prototype_id)
            .map(Arc::unwrap_or_clone)?;

        let state = &mut self.state;
        for graph_id in &removed.definition_graph_ids {
            if let Some(graph) = state.graphs.get_mut(graph_id) {
                if graph.defining_node_ids.contains(prototype_id) {
                    Arc::make_mut(graph).defining_node_ids.retain(|p| p != prototype_id);
                }
            }
        }
        state.saved_node_ids.remove(prototype_id);
        state
            .right_panel_tabs
            .retain(|t| t.node_id() != Some(prototype_id));
        if state.active_definition_node_id.as_ref() == Some(prototype_id) {
            state.active_definition_node_id = None;
        }
        for proto in state.node_prototypes.values_mut() {
            let mentions = proto
                .abstraction_chains
                .values()
                .any(|chain| chain.contains(prototype_id));
            if mentions {
                let proto = Arc::make_mut(proto);
                for chain in proto.abstraction_chains.values_mut() {
                    chain.retain(|p| p != prototype_id);
                }
                proto.abstraction_chains.retain(|_, chain| !chain.is_empty());
            }
        }

        self.record(TargetKind::NodePrototype, prototype_id);
        Some(removed)
    }
}
