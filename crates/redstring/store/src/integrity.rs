use crate::error::ValidationError;
use redstring_types::{
    Edge, EdgeId, Graph, GraphId, GroupId, InstanceId, PrototypeId, StoreState,
};
use std::collections::{BTreeMap, BTreeSet};

/// Guards structural mutations and audits whole snapshots.
///
/// Enforces invariants:
/// - The `typeNodeId` hierarchy is acyclic and the root prototypes stay untyped
/// - Edge endpoints live in the graph that owns the edge
/// - Definition links are recorded on both the prototype and the graph
/// - Auxiliary indices only name entities that exist
pub struct IntegrityGuard;

impl IntegrityGuard {
    /// Validate `setNodeType(node, type_id)`. `None` clears the type.
    ///
    /// Node prototypes may only be typed by node prototypes and edge
    /// prototypes by edge prototypes.
    pub fn check_set_type(
        state: &StoreState,
        node: &PrototypeId,
        type_id: Option<&PrototypeId>,
    ) -> Result<(), ValidationError> {
        let is_node = state.node_prototypes.contains_key(node);
        if !is_node && !state.edge_prototypes.contains_key(node) {
            return Err(ValidationError::PrototypeNotFound(node.clone()));
        }
        if node.is_root() {
            return Err(ValidationError::ImmutableRootType(node.clone()));
        }
        let Some(type_id) = type_id else {
            return Ok(());
        };
        if type_id == node {
            return Err(ValidationError::SelfType(node.clone()));
        }
        let type_exists = if is_node {
            state.node_prototypes.contains_key(type_id)
        } else {
            state.edge_prototypes.contains_key(type_id)
        };
        if !type_exists {
            return Err(ValidationError::PrototypeNotFound(type_id.clone()));
        }
        if Self::would_create_cycle(state, node, type_id) {
            return Err(ValidationError::TypeCycle {
                node: node.clone(),
                type_id: type_id.clone(),
            });
        }
        Ok(())
    }

    /// True if walking `type_id`'s chain reaches `node`.
    ///
    /// The visited set guarantees termination even on a snapshot that
    /// already contains a loop elsewhere.
    pub fn would_create_cycle(
        state: &StoreState,
        node: &PrototypeId,
        type_id: &PrototypeId,
    ) -> bool {
        let mut visited = BTreeSet::new();
        let mut current = Some(type_id);
        while let Some(id) = current {
            if id == node {
                return true;
            }
            if !visited.insert(id) {
                return false;
            }
            current = state.type_of(id);
        }
        false
    }

    /// Ancestors of `id` in `typeNodeId` order, nearest first.
    pub fn type_chain(state: &StoreState, id: &PrototypeId) -> Vec<PrototypeId> {
        let mut visited = BTreeSet::from([id]);
        let mut chain = Vec::new();
        let mut current = state.type_of(id);
        while let Some(next) = current {
            if !visited.insert(next) {
                break;
            }
            chain.push(next.clone());
            current = state.type_of(next);
        }
        chain
    }

    /// Validate an edge about to be placed in `graph_id`.
    pub fn check_edge(
        state: &StoreState,
        graph_id: &GraphId,
        edge: &Edge,
    ) -> Result<(), ValidationError> {
        let graph = state
            .graph(graph_id)
            .ok_or_else(|| ValidationError::GraphNotFound(graph_id.clone()))?;

        for endpoint in [&edge.source_id, &edge.destination_id] {
            Self::check_endpoint(state, graph, endpoint)?;
        }
        if let Some(type_id) = &edge.type_node_id {
            if !state.has_prototype(type_id) {
                return Err(ValidationError::PrototypeNotFound(type_id.clone()));
            }
        }
        if let Some(missing) = edge
            .definition_node_ids
            .iter()
            .find(|p| !state.node_prototypes.contains_key(*p))
        {
            return Err(ValidationError::PrototypeNotFound(missing.clone()));
        }
        Self::check_arrows(edge)
    }

    /// Arrowheads may only point at the edge's own endpoints.
    pub fn check_arrows(edge: &Edge) -> Result<(), ValidationError> {
        match edge
            .directionality
            .arrows_toward
            .iter()
            .find(|id| !edge.touches(id))
        {
            Some(stray) => Err(ValidationError::InvalidArrow(stray.clone())),
            None => Ok(()),
        }
    }

    fn check_endpoint(
        state: &StoreState,
        graph: &Graph,
        endpoint: &InstanceId,
    ) -> Result<(), ValidationError> {
        if graph.instances.contains_key(endpoint) {
            return Ok(());
        }
        if state.instance_exists(endpoint) {
            Err(ValidationError::CrossGraphEdge {
                graph: graph.id.clone(),
                instance: endpoint.clone(),
            })
        } else {
            Err(ValidationError::InstanceNotFound(endpoint.clone()))
        }
    }

    /// Every id must name an instance of `graph`.
    pub fn check_members<'a>(
        graph: &Graph,
        members: impl IntoIterator<Item = &'a InstanceId>,
    ) -> Result<(), ValidationError> {
        for member in members {
            if !graph.instances.contains_key(member) {
                return Err(ValidationError::InstanceNotFound(member.clone()));
            }
        }
        Ok(())
    }

    /// Check every structural invariant over a full snapshot.
    pub fn audit(state: &StoreState) -> IntegrityReport {
        let mut report = IntegrityReport::default();
        let mut owners: BTreeMap<&EdgeId, Vec<&GraphId>> = BTreeMap::new();

        for (graph_id, graph) in &state.graphs {
            for instance in graph.instances.values() {
                report.check(state.node_prototypes.contains_key(&instance.prototype_id), || {
                    Violation::UnknownInstancePrototype {
                        graph: graph_id.clone(),
                        instance: instance.id.clone(),
                        prototype: instance.prototype_id.clone(),
                    }
                });
            }

            for edge_id in &graph.edge_ids {
                owners.entry(edge_id).or_default().push(graph_id);
                let Some(edge) = state.edge(edge_id) else {
                    report.check(false, || Violation::MissingEdge {
                        graph: graph_id.clone(),
                        edge: edge_id.clone(),
                    });
                    continue;
                };
                for endpoint in [&edge.source_id, &edge.destination_id] {
                    report.check(graph.instances.contains_key(endpoint), || {
                        Violation::DanglingEndpoint {
                            edge: edge_id.clone(),
                            instance: endpoint.clone(),
                        }
                    });
                }
            }

            for prototype_id in &graph.defining_node_ids {
                let listed = state
                    .node_prototype(prototype_id)
                    .map(|p| p.definition_graph_ids.contains(graph_id))
                    .or_else(|| {
                        state
                            .edge_prototype(prototype_id)
                            .map(|p| p.definition_graph_ids.contains(graph_id))
                    })
                    .unwrap_or(false);
                report.check(listed, || Violation::BrokenDefinitionLink {
                    prototype: prototype_id.clone(),
                    graph: graph_id.clone(),
                });
            }

            for group in graph.groups.values() {
                for member in &group.member_instance_ids {
                    report.check(graph.instances.contains_key(member), || {
                        Violation::DanglingGroupMember {
                            graph: graph_id.clone(),
                            group: group.id.clone(),
                            instance: member.clone(),
                        }
                    });
                }
                if let Some(linked) = &group.linked_node_prototype_id {
                    report.check(state.node_prototypes.contains_key(linked), || {
                        Violation::DanglingReference {
                            site: format!("group {}", group.id),
                            id: linked.to_string(),
                        }
                    });
                }
            }
        }

        for (edge_id, edge) in &state.edges {
            let count = owners.get(edge_id).map_or(0, Vec::len);
            report.check(count == 1, || Violation::EdgeOwnership {
                edge: edge_id.clone(),
                owners: count,
            });
            report.check(Self::check_arrows(edge).is_ok(), || Violation::StrayArrow {
                edge: edge_id.clone(),
            });
            for referenced in edge.referenced_prototypes() {
                report.check(state.has_prototype(referenced), || Violation::DanglingReference {
                    site: format!("edge {}", edge_id),
                    id: referenced.to_string(),
                });
            }
        }

        Self::audit_prototypes(state, &mut report);
        Self::audit_indices(state, &mut report);
        report
    }

    fn audit_prototypes(state: &StoreState, report: &mut IntegrityReport) {
        let prototypes = state
            .node_prototypes
            .values()
            .map(|p| (&p.id, p.type_node_id.as_ref(), &p.definition_graph_ids))
            .chain(
                state
                    .edge_prototypes
                    .values()
                    .map(|p| (&p.id, p.type_node_id.as_ref(), &p.definition_graph_ids)),
            );

        for (id, type_id, definitions) in prototypes {
            if id.is_root() {
                report.check(type_id.is_none(), || Violation::TypedRoot(id.clone()));
            }
            if let Some(type_id) = type_id {
                report.check(state.has_prototype(type_id), || Violation::DanglingReference {
                    site: format!("type of {}", id),
                    id: type_id.to_string(),
                });
            }
            report.check(!Self::chain_revisits(state, id), || Violation::TypeCycle(id.clone()));

            for graph_id in definitions {
                let back = state
                    .graph(graph_id)
                    .map(|g| g.defining_node_ids.contains(id))
                    .unwrap_or(false);
                report.check(back, || Violation::BrokenDefinitionLink {
                    prototype: id.clone(),
                    graph: graph_id.clone(),
                });
            }
        }

        for prototype in state.node_prototypes.values() {
            for member in prototype.abstraction_chains.values().flatten() {
                report.check(state.node_prototypes.contains_key(member), || {
                    Violation::DanglingReference {
                        site: format!("abstraction chain of {}", prototype.id),
                        id: member.to_string(),
                    }
                });
            }
        }
    }

    /// Walk at most `prototype_count` steps and report whether `id` repeats.
    fn chain_revisits(state: &StoreState, id: &PrototypeId) -> bool {
        let mut current = state.type_of(id);
        for _ in 0..state.prototype_count() {
            match current {
                Some(next) if next == id => return true,
                Some(next) => current = state.type_of(next),
                None => return false,
            }
        }
        current.is_some()
    }

    fn audit_indices(state: &StoreState, report: &mut IntegrityReport) {
        let graph_indices = state
            .open_graph_ids
            .iter()
            .map(|g| ("openGraphIds", g))
            .chain(state.expanded_graph_ids.iter().map(|g| ("expandedGraphIds", g)))
            .chain(state.saved_graph_ids.iter().map(|g| ("savedGraphIds", g)))
            .chain(state.active_graph_id.iter().map(|g| ("activeGraphId", g)));
        for (index, graph_id) in graph_indices {
            report.check(state.graphs.contains_key(graph_id), || Violation::DanglingIndex {
                index,
                id: graph_id.to_string(),
            });
        }

        let prototype_indices = state
            .saved_node_ids
            .iter()
            .map(|p| ("savedNodeIds", p))
            .chain(
                state
                    .right_panel_tabs
                    .iter()
                    .filter_map(|t| t.node_id())
                    .map(|p| ("rightPanelTabs", p)),
            )
            .chain(state.active_definition_node_id.iter().map(|p| ("activeDefinitionNodeId", p)));
        for (index, prototype_id) in prototype_indices {
            report.check(state.node_prototypes.contains_key(prototype_id), || {
                Violation::DanglingIndex {
                    index,
                    id: prototype_id.to_string(),
                }
            });
        }

        for pending in state.pending_deletions.values() {
            report.check(state.graphs.contains_key(&pending.graph_id), || Violation::DanglingIndex {
                index: "pendingDeletions",
                id: pending.graph_id.to_string(),
            });
            report.check(!state.instance_exists(&pending.instance_id), || {
                Violation::PendingInstanceLive(pending.instance_id.clone())
            });
        }
    }
}

/// A broken invariant found by [`IntegrityGuard::audit`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Violation {
    #[error("graph {graph} lists missing edge {edge}")]
    MissingEdge { graph: GraphId, edge: EdgeId },
    #[error("edge {edge} endpoint {instance} is not in its graph")]
    DanglingEndpoint { edge: EdgeId, instance: InstanceId },
    #[error("edge {edge} is owned by {owners} graphs")]
    EdgeOwnership { edge: EdgeId, owners: usize },
    #[error("edge {edge} has an arrow toward a non-endpoint")]
    StrayArrow { edge: EdgeId },
    #[error("instance {instance} in {graph} references unknown prototype {prototype}")]
    UnknownInstancePrototype {
        graph: GraphId,
        instance: InstanceId,
        prototype: PrototypeId,
    },
    #[error("definition link {prototype} <-> {graph} is one-sided")]
    BrokenDefinitionLink { prototype: PrototypeId, graph: GraphId },
    #[error("group {group} in {graph} lists missing member {instance}")]
    DanglingGroupMember {
        graph: GraphId,
        group: GroupId,
        instance: InstanceId,
    },
    #[error("{site} references missing {id}")]
    DanglingReference { site: String, id: String },
    #[error("type chain of {0} revisits itself")]
    TypeCycle(PrototypeId),
    #[error("root prototype {0} has a type")]
    TypedRoot(PrototypeId),
    #[error("{index} references missing {id}")]
    DanglingIndex { index: &'static str, id: String },
    #[error("pending deletion {0} is still live")]
    PendingInstanceLive(InstanceId),
}

/// Outcome of a full-snapshot audit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegrityReport {
    pub checks_performed: usize,
    pub violations: Vec<Violation>,
}

impl IntegrityReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    fn check(&mut self, ok: bool, violation: impl FnOnce() -> Violation) {
        self.checks_performed += 1;
        if !ok {
            self.violations.push(violation());
        }
    }
}
