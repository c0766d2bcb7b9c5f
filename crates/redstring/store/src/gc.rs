//! Orphan collection
//!
//! [`Reachability`] is the one rule deciding what is still referenced. It
//! marks from the true roots (root prototypes, bookmarks, tabs, open and
//! saved graphs, pending deletions, edge prototypes) and expands to a fixed
//! point. A kept graph pulls in everything its instances, groups and edges
//! reference plus the prototypes it defines; a kept prototype pulls in its
//! type and its definition graphs. Referrers only count while they are
//! themselves kept, which is what makes a second pass a no-op.

use crate::draft::Draft;
use redstring_types::{EdgeId, GraphId, PrototypeId, StoreState};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// What a collection pass removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcReport {
    pub removed_prototypes: Vec<PrototypeId>,
    pub removed_graphs: Vec<GraphId>,
    pub removed_edges: Vec<EdgeId>,
}

impl GcReport {
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.removed_prototypes.len() + self.removed_graphs.len() + self.removed_edges.len()
    }
}

/// The closure of everything reachable from the root set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reachability {
    pub prototypes: BTreeSet<PrototypeId>,
    pub graphs: BTreeSet<GraphId>,
}

enum Mark<'a> {
    Prototype(&'a PrototypeId),
    Graph(&'a GraphId),
}

impl Reachability {
    pub fn compute(state: &StoreState) -> Self {
        let mut defined_by: BTreeMap<&PrototypeId, Vec<&GraphId>> = BTreeMap::new();
        for graph in state.graphs.values() {
            for prototype_id in &graph.defining_node_ids {
                defined_by.entry(prototype_id).or_default().push(&graph.id);
            }
        }

        let mut reach = Self::default();
        let mut queue: Vec<Mark<'_>> = Vec::new();

        // Prototype roots
        for prototype in state.node_prototypes.values().filter(|p| p.id.is_root()) {
            queue.push(Mark::Prototype(&prototype.id));
        }
        queue.extend(state.edge_prototypes.keys().map(Mark::Prototype));
        queue.extend(state.saved_node_ids.iter().map(Mark::Prototype));
        queue.extend(
            state
                .right_panel_tabs
                .iter()
                .filter_map(|t| t.node_id())
                .map(Mark::Prototype),
        );
        queue.extend(state.active_definition_node_id.iter().map(Mark::Prototype));

        // Graph roots
        queue.extend(state.open_graph_ids.iter().map(Mark::Graph));
        queue.extend(state.active_graph_id.iter().map(Mark::Graph));
        queue.extend(state.saved_graph_ids.iter().map(Mark::Graph));
        for pending in state.pending_deletions.values() {
            queue.push(Mark::Graph(&pending.graph_id));
            queue.push(Mark::Prototype(&pending.instance.prototype_id));
            for edge in &pending.connected_edges {
                queue.extend(edge.referenced_prototypes().map(Mark::Prototype));
            }
        }

        while let Some(mark) = queue.pop() {
            match mark {
                Mark::Prototype(id) => {
                    if !state.has_prototype(id) || !reach.prototypes.insert(id.clone()) {
                        continue;
                    }
                    queue.extend(state.type_of(id).map(Mark::Prototype));
                    let definitions = state
                        .node_prototype(id)
                        .map(|p| &p.definition_graph_ids)
                        .or_else(|| state.edge_prototype(id).map(|p| &p.definition_graph_ids));
                    if let Some(definitions) = definitions {
                        queue.extend(definitions.iter().map(Mark::Graph));
                    }
                    if let Some(graphs) = defined_by.get(id) {
                        queue.extend(graphs.iter().copied().map(Mark::Graph));
                    }
                }
                Mark::Graph(id) => {
                    let Some(graph) = state.graph(id) else {
                        continue;
                    };
                    if !reach.graphs.insert(id.clone()) {
                        continue;
                    }
                    queue.extend(graph.instantiated_prototypes().map(Mark::Prototype));
                    queue.extend(graph.defining_node_ids.iter().map(Mark::Prototype));
                    queue.extend(
                        graph
                            .groups
                            .values()
                            .filter_map(|g| g.linked_node_prototype_id.as_ref())
                            .map(Mark::Prototype),
                    );
                    for edge in graph.edge_ids.iter().filter_map(|e| state.edge(e)) {
                        queue.extend(edge.referenced_prototypes().map(Mark::Prototype));
                    }
                }
            }
        }
        reach
    }

    pub fn keeps_prototype(&self, id: &PrototypeId) -> bool {
        id.is_root() || self.prototypes.contains(id)
    }

    pub fn keeps_graph(&self, id: &GraphId) -> bool {
        self.graphs.contains(id)
    }
}

/// Run one mark-and-sweep pass over the draft.
pub(crate) fn collect(draft: &mut Draft) -> GcReport {
    let mut report = GcReport::default();

    // Structurally broken edges go first, so they never root anything.
    report.removed_edges.extend(sweep_dangling_edges(draft));

    let reach = Reachability::compute(draft.state());

    let doomed_graphs: Vec<GraphId> = draft
        .state()
        .graphs
        .keys()
        .filter(|id| !reach.keeps_graph(id))
        .cloned()
        .collect();
    for graph_id in doomed_graphs {
        if let Some(graph) = draft.remove_graph(&graph_id) {
            report.removed_edges.extend(graph.edge_ids);
            report.removed_graphs.push(graph_id);
        }
    }

    let doomed_prototypes: Vec<PrototypeId> = draft
        .state()
        .node_prototypes
        .keys()
        .filter(|id| !reach.keeps_prototype(id))
        .cloned()
        .collect();
    for prototype_id in doomed_prototypes {
        if draft.remove_node_prototype(&prototype_id).is_some() {
            report.removed_prototypes.push(prototype_id);
        }
    }

    if !report.is_empty() {
        info!(
            prototypes = report.removed_prototypes.len(),
            graphs = report.removed_graphs.len(),
            edges = report.removed_edges.len(),
            "orphaned data collected"
        );
    }
    report
}

/// Drop edges whose owner graph lacks an endpoint, edges no graph lists,
/// and edge ids that resolve to nothing.
fn sweep_dangling_edges(draft: &mut Draft) -> Vec<EdgeId> {
    let state = draft.state();
    let mut owned: BTreeSet<&EdgeId> = BTreeSet::new();
    let mut broken: Vec<EdgeId> = Vec::new();
    let mut stale_ids: Vec<(GraphId, EdgeId)> = Vec::new();

    for graph in state.graphs.values() {
        for edge_id in &graph.edge_ids {
            match state.edge(edge_id) {
                None => stale_ids.push((graph.id.clone(), edge_id.clone())),
                Some(edge) => {
                    let first_owner = owned.insert(edge_id);
                    let endpoints_live = graph.instances.contains_key(&edge.source_id)
                        && graph.instances.contains_key(&edge.destination_id);
                    if first_owner && !endpoints_live {
                        broken.push(edge_id.clone());
                    }
                }
            }
        }
    }
    broken.extend(
        state
            .edges
            .keys()
            .filter(|id| !owned.contains(id))
            .cloned(),
    );

    for (graph_id, edge_id) in stale_ids {
        if let Ok(graph) = draft.graph_mut(&graph_id) {
            graph.strip_edge(&edge_id);
        }
    }
    for edge_id in &broken {
        draft.remove_edge(edge_id);
    }
    broken
}
