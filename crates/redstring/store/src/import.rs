//! Snapshot import and normalization
//!
//! An [`ImportSnapshot`] keeps every entity as raw JSON so one malformed
//! record cannot fail the whole load. [`normalize`] parses what it can,
//! repairs or drops whatever breaks a structural invariant, and reports each
//! defect as an [`ImportError`].

use crate::error::ImportError;
use redstring_types::{
    Edge, EdgeId, EdgePrototype, Graph, GraphId, InstanceId, NodePrototype, PanelTab,
    PendingDeletion, PrototypeId, StoreState,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// A store snapshot as produced by an external loader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportSnapshot {
    pub graphs: BTreeMap<String, Value>,
    pub node_prototypes: BTreeMap<String, Value>,
    pub edge_prototypes: BTreeMap<String, Value>,
    pub edges: BTreeMap<String, Value>,
    pub pending_deletions: BTreeMap<String, Value>,
    pub open_graph_ids: Vec<GraphId>,
    pub active_graph_id: Option<GraphId>,
    pub expanded_graph_ids: Vec<GraphId>,
    pub saved_node_ids: Vec<PrototypeId>,
    pub saved_graph_ids: Vec<GraphId>,
    pub right_panel_tabs: Vec<Value>,
    pub active_definition_node_id: Option<PrototypeId>,
}

impl ImportSnapshot {
    /// Export a committed state in import shape.
    pub fn from_state(state: &StoreState) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(state)?)
    }
}

/// What a completed load produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub errors: Vec<ImportError>,
    pub graphs: usize,
    pub prototypes: usize,
    pub edges: usize,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn new(state: &StoreState, errors: Vec<ImportError>) -> Self {
        Self {
            errors,
            graphs: state.graphs.len(),
            prototypes: state.prototype_count(),
            edges: state.edges.len(),
        }
    }
}

/// Working set of owned entities while repairs run.
struct Staging {
    graphs: BTreeMap<GraphId, Graph>,
    nodes: BTreeMap<PrototypeId, NodePrototype>,
    edge_protos: BTreeMap<PrototypeId, EdgePrototype>,
    edges: BTreeMap<EdgeId, Edge>,
    errors: Vec<ImportError>,
}

impl Staging {
    fn has_prototype(&self, id: &PrototypeId) -> bool {
        self.nodes.contains_key(id) || self.edge_protos.contains_key(id)
    }
}

/// Turn a raw snapshot into a state that passes
/// [`IntegrityGuard::audit`](crate::integrity::IntegrityGuard::audit).
pub fn normalize(snapshot: ImportSnapshot) -> (StoreState, Vec<ImportError>) {
    let mut errors = Vec::new();
    let graphs = parse_entities(snapshot.graphs, "graph", &mut errors, |g: &Graph| g.id.clone());
    let nodes = parse_entities(
        snapshot.node_prototypes,
        "nodePrototype",
        &mut errors,
        |p: &NodePrototype| p.id.clone(),
    );
    let edge_protos = parse_entities(
        snapshot.edge_prototypes,
        "edgePrototype",
        &mut errors,
        |p: &EdgePrototype| p.id.clone(),
    );
    let edges = parse_entities(snapshot.edges, "edge", &mut errors, |e: &Edge| e.id.clone());

    let mut staging = Staging {
        graphs,
        nodes,
        edge_protos,
        edges,
        errors,
    };
    repair_prototypes(&mut staging);
    repair_graphs(&mut staging);
    repair_edges(&mut staging);
    repair_definitions(&mut staging);

    let Staging {
        graphs,
        nodes,
        edge_protos,
        edges,
        mut errors,
    } = staging;

    let mut state = StoreState {
        graphs: graphs.into_iter().map(|(k, v)| (k, Arc::new(v))).collect(),
        node_prototypes: nodes.into_iter().map(|(k, v)| (k, Arc::new(v))).collect(),
        edge_prototypes: edge_protos.into_iter().map(|(k, v)| (k, Arc::new(v))).collect(),
        edges: edges.into_iter().map(|(k, v)| (k, Arc::new(v))).collect(),
        ..StoreState::default()
    };

    let pending: BTreeMap<InstanceId, PendingDeletion> = parse_entities(
        snapshot.pending_deletions,
        "pendingDeletion",
        &mut errors,
        |p: &PendingDeletion| p.instance_id.clone(),
    );
    for (id, entry) in pending {
        if !state.graphs.contains_key(&entry.graph_id) || state.instance_exists(&id) {
            errors.push(ImportError::DanglingIndex {
                index: "pendingDeletions",
                id: id.to_string(),
            });
            continue;
        }
        state.pending_deletions.insert(id, Arc::new(entry));
    }

    let tabs = snapshot
        .right_panel_tabs
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<PanelTab>(raw) {
            Ok(tab) => Some(tab),
            Err(e) => {
                errors.push(ImportError::Malformed {
                    kind: "tab",
                    id: String::new(),
                    reason: e.to_string(),
                });
                None
            }
        })
        .collect();
    restore_indices(
        &mut state,
        IndexLists {
            open: snapshot.open_graph_ids,
            active: snapshot.active_graph_id,
            expanded: snapshot.expanded_graph_ids,
            saved_nodes: snapshot.saved_node_ids,
            saved_graphs: snapshot.saved_graph_ids,
            tabs,
            active_definition: snapshot.active_definition_node_id,
        },
        &mut errors,
    );

    if errors.is_empty() {
        debug!(graphs = state.graphs.len(), "snapshot imported cleanly");
    } else {
        for error in &errors {
            warn!(error = %error, "import defect repaired");
        }
    }
    (state, errors)
}

fn parse_entities<T, K>(
    raw: BTreeMap<String, Value>,
    kind: &'static str,
    errors: &mut Vec<ImportError>,
    key: impl Fn(&T) -> K,
) -> BTreeMap<K, T>
where
    T: DeserializeOwned,
    K: Ord,
{
    let mut parsed = BTreeMap::new();
    for (id, value) in raw {
        match serde_json::from_value::<T>(value) {
            Ok(entity) => {
                parsed.insert(key(&entity), entity);
            }
            Err(e) => errors.push(ImportError::Malformed {
                kind,
                id,
                reason: e.to_string(),
            }),
        }
    }
    parsed
}

fn repair_prototypes(s: &mut Staging) {
    let thing = NodePrototype::base_thing();
    s.nodes.entry(thing.id.clone()).or_insert(thing);
    let connection = EdgePrototype::base_connection();
    s.edge_protos.entry(connection.id.clone()).or_insert(connection);

    let collisions: Vec<PrototypeId> = s
        .edge_protos
        .keys()
        .filter(|id| s.nodes.contains_key(*id))
        .cloned()
        .collect();
    for id in collisions {
        s.edge_protos.remove(&id);
        s.errors.push(ImportError::Malformed {
            kind: "edgePrototype",
            id: id.to_string(),
            reason: "id already used by a node prototype".into(),
        });
    }

    for root in [PrototypeId::base_thing(), PrototypeId::base_connection()] {
        let typed = s
            .nodes
            .get_mut(&root)
            .map(|p| p.type_node_id.take().is_some())
            .or_else(|| s.edge_protos.get_mut(&root).map(|p| p.type_node_id.take().is_some()))
            .unwrap_or(false);
        if typed {
            s.errors.push(ImportError::Malformed {
                kind: "prototype",
                id: root.to_string(),
                reason: "root prototypes cannot be typed".into(),
            });
        }
    }

    // Types stay within their own map.
    let node_ids: BTreeSet<PrototypeId> = s.nodes.keys().cloned().collect();
    for proto in s.nodes.values_mut() {
        if let Some(type_id) = &proto.type_node_id {
            if !node_ids.contains(type_id) || type_id == &proto.id {
                s.errors.push(ImportError::UnknownPrototype {
                    owner: proto.id.to_string(),
                    prototype: type_id.to_string(),
                });
                proto.type_node_id = None;
            }
        }
        let before = proto.abstraction_chains.values().map(Vec::len).sum::<usize>();
        for chain in proto.abstraction_chains.values_mut() {
            chain.retain(|p| node_ids.contains(p));
        }
        proto.abstraction_chains.retain(|_, chain| chain.len() > 1);
        if proto.abstraction_chains.values().map(Vec::len).sum::<usize>() != before {
            s.errors.push(ImportError::DanglingIndex {
                index: "abstractionChains",
                id: proto.id.to_string(),
            });
        }
    }
    let edge_ids: BTreeSet<PrototypeId> = s.edge_protos.keys().cloned().collect();
    for proto in s.edge_protos.values_mut() {
        if let Some(type_id) = &proto.type_node_id {
            if !edge_ids.contains(type_id) || type_id == &proto.id {
                s.errors.push(ImportError::UnknownPrototype {
                    owner: proto.id.to_string(),
                    prototype: type_id.to_string(),
                });
                proto.type_node_id = None;
            }
        }
    }

    let mut node_types: BTreeMap<PrototypeId, Option<PrototypeId>> = s
        .nodes
        .values()
        .map(|p| (p.id.clone(), p.type_node_id.clone()))
        .collect();
    for id in break_type_cycles(&mut node_types) {
        if let Some(proto) = s.nodes.get_mut(&id) {
            proto.type_node_id = None;
        }
        s.errors.push(ImportError::TypeCycle(id));
    }
    let mut edge_types: BTreeMap<PrototypeId, Option<PrototypeId>> = s
        .edge_protos
        .values()
        .map(|p| (p.id.clone(), p.type_node_id.clone()))
        .collect();
    for id in break_type_cycles(&mut edge_types) {
        if let Some(proto) = s.edge_protos.get_mut(&id) {
            proto.type_node_id = None;
        }
        s.errors.push(ImportError::TypeCycle(id));
    }
}

/// Clear one link per type loop. Returns the prototypes whose type was cleared.
fn break_type_cycles(types: &mut BTreeMap<PrototypeId, Option<PrototypeId>>) -> Vec<PrototypeId> {
    let ids: Vec<PrototypeId> = types.keys().cloned().collect();
    let mut broken = Vec::new();
    for id in ids {
        let mut seen = BTreeSet::new();
        let mut current = types.get(&id).cloned().flatten();
        while let Some(next) = current {
            if next == id {
                types.insert(id.clone(), None);
                broken.push(id.clone());
                break;
            }
            if !seen.insert(next.clone()) {
                break;
            }
            current = types.get(&next).cloned().flatten();
        }
    }
    broken
}

fn repair_graphs(s: &mut Staging) {
    let mut seen_instances: BTreeSet<InstanceId> = BTreeSet::new();
    for (graph_id, graph) in s.graphs.iter_mut() {
        let mut kept = BTreeMap::new();
        for (id, instance) in std::mem::take(&mut graph.instances) {
            if !s.nodes.contains_key(&instance.prototype_id) {
                s.errors.push(ImportError::UnknownPrototype {
                    owner: format!("instance {}", id),
                    prototype: instance.prototype_id.to_string(),
                });
                continue;
            }
            if !seen_instances.insert(id.clone()) {
                s.errors.push(ImportError::DuplicateInstance(id));
                continue;
            }
            kept.insert(id, instance);
        }
        graph.instances = kept;

        for group in graph.groups.values_mut() {
            let members = group.member_instance_ids.len();
            group
                .member_instance_ids
                .retain(|m| graph.instances.contains_key(m));
            if group.member_instance_ids.len() != members {
                s.errors.push(ImportError::DanglingIndex {
                    index: "groupMembers",
                    id: format!("{}/{}", graph_id, group.id),
                });
            }
            if let Some(linked) = &group.linked_node_prototype_id {
                if !s.nodes.contains_key(linked) {
                    s.errors.push(ImportError::UnknownPrototype {
                        owner: format!("group {}", group.id),
                        prototype: linked.to_string(),
                    });
                    group.linked_node_prototype_id = None;
                    group.linked_definition_index = None;
                }
            }
        }
    }
}

fn repair_edges(s: &mut Staging) {
    // First listing graph owns the edge.
    let mut owner: BTreeMap<EdgeId, GraphId> = BTreeMap::new();
    for (graph_id, graph) in s.graphs.iter_mut() {
        let mut listed = Vec::with_capacity(graph.edge_ids.len());
        for edge_id in std::mem::take(&mut graph.edge_ids) {
            if !s.edges.contains_key(&edge_id) {
                s.errors.push(ImportError::MissingGraphEdge {
                    graph: graph_id.clone(),
                    edge: edge_id,
                });
                continue;
            }
            if owner.contains_key(&edge_id) {
                s.errors.push(ImportError::MissingGraphEdge {
                    graph: graph_id.clone(),
                    edge: edge_id,
                });
                continue;
            }
            owner.insert(edge_id.clone(), graph_id.clone());
            listed.push(edge_id);
        }
        graph.edge_ids = listed;
    }

    let mut dropped = Vec::new();
    for (edge_id, edge) in s.edges.iter_mut() {
        let Some(graph) = owner.get(edge_id).and_then(|g| s.graphs.get(g)) else {
            s.errors.push(ImportError::UnownedEdge(edge_id.clone()));
            dropped.push(edge_id.clone());
            continue;
        };
        if let Some(missing) = [&edge.source_id, &edge.destination_id]
            .into_iter()
            .find(|i| !graph.instances.contains_key(*i))
        {
            s.errors.push(ImportError::DanglingEdge {
                edge: edge_id.clone(),
                instance: missing.clone(),
            });
            dropped.push(edge_id.clone());
            continue;
        }

        let stray: Vec<InstanceId> = edge
            .directionality
            .arrows_toward
            .iter()
            .filter(|i| !edge.touches(i))
            .cloned()
            .collect();
        for instance in stray {
            edge.directionality.arrows_toward.remove(&instance);
            s.errors.push(ImportError::InvalidDirectionality {
                edge: edge_id.clone(),
                instance,
            });
        }

        if let Some(type_id) = &edge.type_node_id {
            if !(s.nodes.contains_key(type_id) || s.edge_protos.contains_key(type_id)) {
                s.errors.push(ImportError::UnknownPrototype {
                    owner: format!("edge {}", edge_id),
                    prototype: type_id.to_string(),
                });
                edge.type_node_id = Some(PrototypeId::base_connection());
            }
        }
        let nodes = &s.nodes;
        let errors = &mut s.errors;
        edge.definition_node_ids.retain(|p| {
            let known = nodes.contains_key(p);
            if !known {
                errors.push(ImportError::UnknownPrototype {
                    owner: format!("edge {}", edge_id),
                    prototype: p.to_string(),
                });
            }
            known
        });
    }

    for edge_id in dropped {
        s.edges.remove(&edge_id);
        if let Some(graph) = owner.get(&edge_id).and_then(|g| s.graphs.get_mut(g)) {
            graph.strip_edge(&edge_id);
        }
    }
}

/// Make definition links two-sided: a link either side asserts is kept when
/// both ends exist, and dropped otherwise.
fn repair_definitions(s: &mut Staging) {
    let mut links: BTreeSet<(PrototypeId, GraphId)> = BTreeSet::new();
    let listed_by_prototypes = s
        .nodes
        .values()
        .map(|p| (&p.id, &p.definition_graph_ids))
        .chain(s.edge_protos.values().map(|p| (&p.id, &p.definition_graph_ids)));
    for (prototype_id, graph_ids) in listed_by_prototypes {
        for graph_id in graph_ids {
            links.insert((prototype_id.clone(), graph_id.clone()));
        }
    }
    for graph in s.graphs.values() {
        for prototype_id in &graph.defining_node_ids {
            links.insert((prototype_id.clone(), graph.id.clone()));
        }
    }

    let mut valid = BTreeSet::new();
    for (prototype_id, graph_id) in links {
        if s.has_prototype(&prototype_id) && s.graphs.contains_key(&graph_id) {
            valid.insert((prototype_id, graph_id));
        } else {
            s.errors.push(ImportError::BrokenDefinitionLink {
                prototype: prototype_id.to_string(),
                graph: graph_id,
            });
        }
    }

    let mut repaired: BTreeSet<(PrototypeId, GraphId)> = BTreeSet::new();
    let mut reconcile = |id: &PrototypeId, list: &mut Vec<GraphId>| {
        let mut kept: Vec<GraphId> = Vec::new();
        for graph_id in list.drain(..) {
            if valid.contains(&(id.clone(), graph_id.clone())) && !kept.contains(&graph_id) {
                kept.push(graph_id);
            }
        }
        for (p, g) in valid.iter().filter(|(p, _)| p == id) {
            if !kept.contains(g) {
                kept.push(g.clone());
                repaired.insert((p.clone(), g.clone()));
            }
        }
        *list = kept;
    };
    for proto in s.nodes.values_mut() {
        reconcile(&proto.id, &mut proto.definition_graph_ids);
    }
    for proto in s.edge_protos.values_mut() {
        reconcile(&proto.id, &mut proto.definition_graph_ids);
    }
    for graph in s.graphs.values_mut() {
        let mut kept: Vec<PrototypeId> = Vec::new();
        for prototype_id in graph.defining_node_ids.drain(..) {
            if valid.contains(&(prototype_id.clone(), graph.id.clone()))
                && !kept.contains(&prototype_id)
            {
                kept.push(prototype_id);
            }
        }
        for (p, g) in valid.iter().filter(|(_, g)| g == &graph.id) {
            if !kept.contains(p) {
                kept.push(p.clone());
                repaired.insert((p.clone(), g.clone()));
            }
        }
        graph.defining_node_ids = kept;
    }
    for (prototype, graph) in repaired {
        s.errors.push(ImportError::BrokenDefinitionLink {
            prototype: prototype.to_string(),
            graph,
        });
    }

    // Node-group indices must land inside the linked prototype's list.
    let nodes = &s.nodes;
    for graph in s.graphs.values_mut() {
        for group in graph.groups.values_mut() {
            let Some(linked) = &group.linked_node_prototype_id else {
                continue;
            };
            let definitions = nodes.get(linked).map_or(0, |p| p.definition_graph_ids.len());
            if group.linked_definition_index.is_some_and(|i| i >= definitions) {
                group.linked_definition_index = None;
            }
        }
    }
}

struct IndexLists {
    open: Vec<GraphId>,
    active: Option<GraphId>,
    expanded: Vec<GraphId>,
    saved_nodes: Vec<PrototypeId>,
    saved_graphs: Vec<GraphId>,
    tabs: Vec<PanelTab>,
    active_definition: Option<PrototypeId>,
}

fn restore_indices(state: &mut StoreState, lists: IndexLists, errors: &mut Vec<ImportError>) {
    let mut keep_graph = |index: &'static str, id: &GraphId| {
        let known = state.graphs.contains_key(id);
        if !known {
            errors.push(ImportError::DanglingIndex {
                index,
                id: id.to_string(),
            });
        }
        known
    };

    let mut open = Vec::new();
    for id in lists.open {
        if keep_graph("openGraphIds", &id) && !open.contains(&id) {
            open.push(id);
        }
    }
    let expanded = lists
        .expanded
        .into_iter()
        .filter(|id| keep_graph("expandedGraphIds", id))
        .collect();
    let saved_graphs = lists
        .saved_graphs
        .into_iter()
        .filter(|id| keep_graph("savedGraphIds", id))
        .collect();
    let active = lists
        .active
        .filter(|id| keep_graph("activeGraphId", id) && open.contains(id))
        .or_else(|| open.first().cloned());

    let nodes: BTreeSet<PrototypeId> = state.node_prototypes.keys().cloned().collect();
    let mut keep_node = |index: &'static str, id: &PrototypeId| {
        let known = nodes.contains(id);
        if !known {
            errors.push(ImportError::DanglingIndex {
                index,
                id: id.to_string(),
            });
        }
        known
    };
    let saved_nodes = lists
        .saved_nodes
        .into_iter()
        .filter(|id| keep_node("savedNodeIds", id))
        .collect();
    let active_definition = lists
        .active_definition
        .filter(|id| keep_node("activeDefinitionNodeId", id));

    let mut tabs: Vec<PanelTab> = vec![PanelTab {
        is_active: false,
        ..PanelTab::home()
    }];
    for tab in lists.tabs {
        match tab.node_id().cloned() {
            None => tabs[0].is_active |= tab.is_active,
            Some(id) => {
                if keep_node("rightPanelTabs", &id)
                    && !tabs.iter().any(|t| t.target == tab.target)
                {
                    tabs.push(tab);
                }
            }
        }
    }
    let active_tab = tabs.iter().position(|t| t.is_active).unwrap_or(0);
    for (i, tab) in tabs.iter_mut().enumerate() {
        tab.is_active = i == active_tab;
    }

    state.open_graph_ids = open;
    state.active_graph_id = active;
    state.expanded_graph_ids = expanded;
    state.saved_graph_ids = saved_graphs;
    state.saved_node_ids = saved_nodes;
    state.right_panel_tabs = tabs;
    state.active_definition_node_id = active_definition;
}
