//! Prototype and definition-graph consolidation
//!
//! `merge_node_prototypes` folds a secondary prototype into a primary inside
//! one draft: metadata is combined, definition graphs reconciled, and every
//! site that can hold a prototype id is rewritten before the secondary is
//! deleted.

use crate::draft::Draft;
use crate::error::ValidationError;
use crate::integrity::IntegrityGuard;
use crate::ops::{graph, tabs};
use crate::request::{DefinitionMergeStrategy, OutcomeDetail};
use redstring_types::{GraphId, GroupId, NodePrototype, PrototypeId, SemanticMetadata, TargetKind};
use std::sync::Arc;
use tracing::info;

/// Reconcile the definition graphs of `secondary` into `primary`.
///
/// Retained graphs gain `primary` as a defining node. Graphs the primary
/// drops are detached from it; any graph left defining nothing is closed.
/// Returns the graphs not retained.
pub(crate) fn merge_definition_graphs(
    draft: &mut Draft,
    primary_id: &PrototypeId,
    secondary_id: &PrototypeId,
    strategy: &DefinitionMergeStrategy,
) -> Result<Vec<GraphId>, ValidationError> {
    if primary_id == secondary_id {
        return Err(ValidationError::InvalidMerge(format!(
            "{} cannot be merged with itself",
            primary_id
        )));
    }
    let primary_defs = draft.require_node_prototype(primary_id)?.definition_graph_ids.clone();
    let secondary_defs = draft.require_node_prototype(secondary_id)?.definition_graph_ids.clone();

    let mut all = primary_defs.clone();
    for graph_id in &secondary_defs {
        if !all.contains(graph_id) {
            all.push(graph_id.clone());
        }
    }

    let retained: Vec<GraphId> = match strategy {
        DefinitionMergeStrategy::Combine => all.clone(),
        DefinitionMergeStrategy::OverwriteWithPrimary => primary_defs.clone(),
        DefinitionMergeStrategy::OverwriteWithSecondary => secondary_defs.clone(),
        DefinitionMergeStrategy::Selective { graph_ids } => {
            if let Some(stray) = graph_ids.iter().find(|g| !all.contains(g)) {
                return Err(ValidationError::InvalidSelection(format!(
                    "{} is not a definition of {} or {}",
                    stray, primary_id, secondary_id
                )));
            }
            let mut picked: Vec<GraphId> = Vec::new();
            for graph_id in graph_ids {
                if !picked.contains(graph_id) {
                    picked.push(graph_id.clone());
                }
            }
            picked
        }
    };
    let dropped: Vec<GraphId> = all.iter().filter(|g| !retained.contains(g)).cloned().collect();

    for graph_id in primary_defs.iter().filter(|g| dropped.contains(g)) {
        draft.detach_definition(primary_id, graph_id);
    }
    // Existing definitions keep their indices; new ones are appended.
    for graph_id in retained.iter().filter(|g| !primary_defs.contains(g)) {
        draft
            .node_prototype_mut(primary_id)?
            .definition_graph_ids
            .push(graph_id.clone());
        let graph = draft.graph_mut(graph_id)?;
        if !graph.defining_node_ids.contains(primary_id) {
            graph.defining_node_ids.push(primary_id.clone());
        }
        draft.record(TargetKind::Graph, graph_id);
    }
    draft.record(TargetKind::NodePrototype, primary_id);

    for graph_id in &dropped {
        close_if_undefined(draft, graph_id, primary_id);
    }
    Ok(dropped)
}

/// Close a graph that no longer defines anything. If it was active, focus
/// moves to the first definition of `redirect_to`.
fn close_if_undefined(draft: &mut Draft, graph_id: &GraphId, redirect_to: &PrototypeId) {
    let undefined = draft
        .state()
        .graph(graph_id)
        .map(|g| g.defining_node_ids.is_empty())
        .unwrap_or(false);
    if !undefined {
        return;
    }
    let was_active = draft.state().active_graph_id.as_ref() == Some(graph_id);
    graph::close(draft, graph_id);
    if was_active {
        let target = draft
            .state()
            .node_prototype(redirect_to)
            .and_then(|p| p.definition_graph_ids.first().cloned());
        if let Some(target) = target {
            graph::open_and_activate(draft, &target);
        }
    }
    draft.record(TargetKind::Graph, graph_id);
}

pub(crate) fn merge_node_prototypes(
    draft: &mut Draft,
    primary_id: &PrototypeId,
    secondary_id: &PrototypeId,
    strategy: &DefinitionMergeStrategy,
) -> Result<OutcomeDetail, ValidationError> {
    if secondary_id.is_root() {
        return Err(ValidationError::InvalidMerge(format!(
            "root prototype {} cannot be merged away",
            secondary_id
        )));
    }
    let secondary = draft.require_node_prototype(secondary_id)?.clone();

    // Which definition each secondary node-group pointed at, by graph id.
    let secondary_links = node_group_links(draft, secondary_id, &secondary.definition_graph_ids);

    merge_definition_graphs(draft, primary_id, secondary_id, strategy)?;
    for graph_id in &secondary.definition_graph_ids {
        draft.detach_definition(secondary_id, graph_id);
        close_if_undefined(draft, graph_id, primary_id);
    }

    let primary = draft.node_prototype_mut(primary_id)?;
    absorb(primary, &secondary);
    draft.record(TargetKind::NodePrototype, primary_id);

    repoint(draft, secondary_id, primary_id);

    let primary_defs = draft.require_node_prototype(primary_id)?.definition_graph_ids.clone();
    for (graph_id, group_id, target) in secondary_links {
        let index = target.and_then(|t| primary_defs.iter().position(|g| g == &t));
        if let Ok(graph) = draft.graph_mut(&graph_id) {
            if let Some(group) = graph.groups.get_mut(&group_id) {
                group.linked_definition_index = index;
            }
        }
    }

    draft.remove_node_prototype(secondary_id);
    settle_type(draft, primary_id)?;

    info!(primary = %primary_id, secondary = %secondary_id, "prototypes merged");
    Ok(OutcomeDetail::None)
}

fn node_group_links(
    draft: &Draft,
    prototype_id: &PrototypeId,
    definitions: &[GraphId],
) -> Vec<(GraphId, GroupId, Option<GraphId>)> {
    let mut links = Vec::new();
    for graph in draft.state().graphs.values() {
        for group in graph.groups.values() {
            if group.linked_node_prototype_id.as_ref() == Some(prototype_id) {
                let target = group
                    .linked_definition_index
                    .and_then(|i| definitions.get(i).cloned());
                links.push((graph.id.clone(), group.id.clone(), target));
            }
        }
    }
    links
}

/// Combine the secondary's descriptive data into the primary.
fn absorb(primary: &mut NodePrototype, secondary: &NodePrototype) {
    if secondary.description.trim().len() > primary.description.trim().len() {
        primary.description = secondary.description.clone();
    }
    merge_semantic(&mut primary.semantic, &secondary.semantic);
    // Roots stay untyped.
    if primary.type_node_id.is_none() && !primary.id.is_root() {
        primary.type_node_id = secondary.type_node_id.clone();
    }
    for (dimension, chain) in &secondary.abstraction_chains {
        let target = primary.abstraction_chains.entry(dimension.clone()).or_default();
        for member in chain {
            if !target.contains(member) {
                target.push(member.clone());
            }
        }
    }
}

fn merge_semantic(primary: &mut SemanticMetadata, secondary: &SemanticMetadata) {
    for link in &secondary.external_links {
        if !primary.external_links.contains(link) {
            primary.external_links.push(link.clone());
        }
    }
    for class in &secondary.equivalent_classes {
        if !primary.equivalent_classes.contains(class) {
            primary.equivalent_classes.push(class.clone());
        }
    }
    primary.relationships.extend(secondary.relationships.iter().cloned());
    primary.confidence = match (primary.confidence, secondary.confidence) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
}

fn swap_id(slot: &mut PrototypeId, from: &PrototypeId, to: &PrototypeId) -> bool {
    if slot == from {
        *slot = to.clone();
        true
    } else {
        false
    }
}

fn swap_in_list(list: &mut Vec<PrototypeId>, from: &PrototypeId, to: &PrototypeId) {
    let mut seen = Vec::with_capacity(list.len());
    for mut id in list.drain(..) {
        swap_id(&mut id, from, to);
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    *list = seen;
}

/// Rewrite every reference to `from` as `to`. Entities are only copied when
/// they actually mention `from`.
fn repoint(draft: &mut Draft, from: &PrototypeId, to: &PrototypeId) {
    let mentions = |id: &Option<PrototypeId>| id.as_ref() == Some(from);
    let mut touched = Vec::new();
    let state = draft.state_mut();

    for graph in state.graphs.values_mut() {
        let hit = graph.instantiated_prototypes().any(|p| p == from)
            || graph.defining_node_ids.contains(from)
            || graph.groups.values().any(|g| mentions(&g.linked_node_prototype_id));
        if !hit {
            continue;
        }
        let graph = Arc::make_mut(graph);
        for instance in graph.instances.values_mut() {
            swap_id(&mut instance.prototype_id, from, to);
        }
        for group in graph.groups.values_mut() {
            if let Some(linked) = group.linked_node_prototype_id.as_mut() {
                swap_id(linked, from, to);
            }
        }
        swap_in_list(&mut graph.defining_node_ids, from, to);
        touched.push((TargetKind::Graph, graph.id.to_string()));
    }

    for proto in state.node_prototypes.values_mut() {
        let hit = mentions(&proto.type_node_id)
            || proto.abstraction_chains.values().flatten().any(|p| p == from);
        if !hit {
            continue;
        }
        let proto = Arc::make_mut(proto);
        if let Some(type_id) = proto.type_node_id.as_mut() {
            swap_id(type_id, from, to);
        }
        for chain in proto.abstraction_chains.values_mut() {
            swap_in_list(chain, from, to);
        }
        touched.push((TargetKind::NodePrototype, proto.id.to_string()));
    }

    for proto in state.edge_prototypes.values_mut() {
        if mentions(&proto.type_node_id) {
            Arc::make_mut(proto).type_node_id = Some(to.clone());
            touched.push((TargetKind::EdgePrototype, proto.id.to_string()));
        }
    }

    for edge in state.edges.values_mut() {
        if !edge.referenced_prototypes().any(|p| p == from) {
            continue;
        }
        let edge = Arc::make_mut(edge);
        if let Some(type_id) = edge.type_node_id.as_mut() {
            swap_id(type_id, from, to);
        }
        swap_in_list(&mut edge.definition_node_ids, from, to);
        touched.push((TargetKind::Edge, edge.id.to_string()));
    }

    for pending in state.pending_deletions.values_mut() {
        let hit = pending.instance.prototype_id == *from
            || pending
                .connected_edges
                .iter()
                .any(|e| e.referenced_prototypes().any(|p| p == from));
        if !hit {
            continue;
        }
        let pending = Arc::make_mut(pending);
        swap_id(&mut pending.instance.prototype_id, from, to);
        for edge in &mut pending.connected_edges {
            if let Some(type_id) = edge.type_node_id.as_mut() {
                swap_id(type_id, from, to);
            }
            swap_in_list(&mut edge.definition_node_ids, from, to);
        }
        touched.push((TargetKind::PendingDeletion, pending.instance_id.to_string()));
    }

    let mut tabs_changed = false;
    for tab in &mut state.right_panel_tabs {
        if let redstring_types::TabTarget::Node { node_id } = &mut tab.target {
            tabs_changed |= swap_id(node_id, from, to);
        }
    }
    if tabs_changed {
        tabs::dedup_tabs(&mut state.right_panel_tabs);
        touched.push((TargetKind::Tab, to.to_string()));
    }
    if let Some(active) = state.active_definition_node_id.as_mut() {
        swap_id(active, from, to);
    }
    if state.saved_node_ids.remove(from) {
        state.saved_node_ids.insert(to.clone());
    }

    for (target, id) in touched {
        draft.record(target, id);
    }
}

/// Clear the primary's inherited type if it now points at itself or closes
/// a loop.
fn settle_type(draft: &mut Draft, primary_id: &PrototypeId) -> Result<(), ValidationError> {
    let Some(type_id) = draft.state().type_of(primary_id).cloned() else {
        return Ok(());
    };
    let broken = primary_id.is_root()
        || type_id == *primary_id
        || !draft.state().node_prototypes.contains_key(&type_id)
        || IntegrityGuard::would_create_cycle(draft.state(), primary_id, &type_id);
    if broken {
        draft.node_prototype_mut(primary_id)?.type_node_id = None;
    }
    Ok(())
}
