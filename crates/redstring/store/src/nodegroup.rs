//! Group and node-group conversions
//!
//! Lifting a group copies its members and the edges among them into a new
//! definition graph of a prototype. Collapsing goes the other way: the
//! members are replaced by one instance of that prototype, and every edge
//! that crossed the group boundary is rewired onto it.

use crate::draft::Draft;
use crate::error::ValidationError;
use crate::ops::prototype;
use crate::request::{NodeGroupPrototype, OutcomeDetail};
use redstring_types::{
    Directionality, Edge, EdgeId, Graph, GraphId, GroupId, InstanceId, NodeInstance, PrototypeId,
    TargetKind,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub(crate) fn convert_group_to_node_group(
    draft: &mut Draft,
    graph_id: &GraphId,
    group_id: &GroupId,
    target: NodeGroupPrototype,
) -> Result<OutcomeDetail, ValidationError> {
    let group = require_group(draft, graph_id, group_id)?;
    if group.is_node_group() {
        return Err(ValidationError::AlreadyNodeGroup(group_id.clone()));
    }
    if group.member_instance_ids.is_empty() {
        return Err(ValidationError::EmptyGroup(group_id.clone()));
    }
    let members = group.member_instance_ids.clone();

    let prototype_id = match target {
        NodeGroupPrototype::Existing { prototype_id } => {
            draft.require_node_prototype(&prototype_id)?;
            prototype_id
        }
        NodeGroupPrototype::New { prototype } => {
            let id = prototype.id.clone();
            prototype::add_node_prototype(draft, prototype)?;
            id
        }
    };
    let name = draft.require_node_prototype(&prototype_id)?.name.clone();

    let source = draft.require_graph(graph_id)?.clone();
    let mut definition = Graph::new(GraphId::generate(), name);
    definition.defining_node_ids.push(prototype_id.clone());

    let mut copies: BTreeMap<InstanceId, InstanceId> = BTreeMap::new();
    for member in &members {
        if let Some(instance) = source.instances.get(member) {
            let copy = NodeInstance {
                id: InstanceId::generate(),
                ..instance.clone()
            };
            copies.insert(member.clone(), copy.id.clone());
            definition.instances.insert(copy.id.clone(), copy);
        }
    }

    let internal: Vec<Edge> = source
        .edge_ids
        .iter()
        .filter_map(|eid| draft.state().edge(eid))
        .filter(|e| members.contains(&e.source_id) && members.contains(&e.destination_id))
        .cloned()
        .collect();

    let definition_id = definition.id.clone();
    draft.insert_graph(definition);
    for edge in internal {
        let (Some(source_copy), Some(destination_copy)) =
            (copies.get(&edge.source_id), copies.get(&edge.destination_id))
        else {
            continue;
        };
        let copy = Edge {
            id: EdgeId::generate(),
            source_id: source_copy.clone(),
            destination_id: destination_copy.clone(),
            directionality: remap_arrows(&edge.directionality, |id| copies.get(id).cloned()),
            ..edge
        };
        draft.insert_edge(&definition_id, copy)?;
    }

    let proto = draft.node_prototype_mut(&prototype_id)?;
    proto.definition_graph_ids.push(definition_id.clone());
    let index = proto.definition_graph_ids.len() - 1;
    draft.record(TargetKind::NodePrototype, &prototype_id);

    if let Some(group) = draft.graph_mut(graph_id)?.groups.get_mut(group_id) {
        group.linked_node_prototype_id = Some(prototype_id.clone());
        group.linked_definition_index = Some(index);
    }
    draft.record(TargetKind::Group, group_id);

    debug!(
        group = %group_id,
        prototype = %prototype_id,
        definition = %definition_id,
        "group lifted to node-group"
    );
    Ok(OutcomeDetail::Created(definition_id.to_string()))
}

/// Drop the prototype link; members and the definition graph stay.
pub(crate) fn convert_node_group_to_group(
    draft: &mut Draft,
    graph_id: &GraphId,
    group_id: &GroupId,
) -> Result<OutcomeDetail, ValidationError> {
    if !require_group(draft, graph_id, group_id)?.is_node_group() {
        return Err(ValidationError::NotANodeGroup(group_id.clone()));
    }
    if let Some(group) = draft.graph_mut(graph_id)?.groups.get_mut(group_id) {
        group.linked_node_prototype_id = None;
        group.linked_definition_index = None;
    }
    draft.record(TargetKind::Group, group_id);
    Ok(OutcomeDetail::None)
}

/// Replace a node-group's members with a single instance of its prototype.
pub(crate) fn collapse_node_group(
    draft: &mut Draft,
    graph_id: &GraphId,
    group_id: &GroupId,
    instance_id: Option<InstanceId>,
) -> Result<OutcomeDetail, ValidationError> {
    let group = require_group(draft, graph_id, group_id)?;
    let Some(prototype_id) = group.linked_node_prototype_id.clone() else {
        return Err(ValidationError::NotANodeGroup(group_id.clone()));
    };
    let members = group.member_instance_ids.clone();
    if members.is_empty() {
        return Err(ValidationError::EmptyGroup(group_id.clone()));
    }
    draft.require_node_prototype(&prototype_id)?;
    let instance_id = instance_id.unwrap_or_else(InstanceId::generate);
    if draft.instance_id_taken(&instance_id) {
        return Err(ValidationError::AlreadyExists {
            kind: "instance",
            id: instance_id.to_string(),
        });
    }

    let graph = draft.require_graph(graph_id)?;
    let (x, y) = centroid(graph, &members);
    let crossing = partition_edges(draft, graph_id, &members);

    draft
        .graph_mut(graph_id)?
        .instances
        .insert(instance_id.clone(), NodeInstance::new(instance_id.clone(), prototype_id, x, y));
    draft.record(TargetKind::Instance, &instance_id);

    for (edge_id, internal) in crossing {
        if internal {
            draft.remove_edge(&edge_id);
            continue;
        }
        let edge = draft.edge_mut(&edge_id)?;
        let onto = |id: &InstanceId| {
            if members.contains(id) {
                instance_id.clone()
            } else {
                id.clone()
            }
        };
        edge.source_id = onto(&edge.source_id);
        edge.destination_id = onto(&edge.destination_id);
        edge.directionality = remap_arrows(&edge.directionality, |id| Some(onto(id)));
        draft.record(TargetKind::Edge, &edge_id);
    }

    let graph = draft.graph_mut(graph_id)?;
    for member in &members {
        graph.instances.remove(member);
        graph.forget_member(member);
    }
    graph.groups.remove(group_id);
    for member in &members {
        draft.record(TargetKind::Instance, member);
    }
    draft.record(TargetKind::Group, group_id);

    debug!(group = %group_id, instance = %instance_id, "node-group collapsed");
    Ok(OutcomeDetail::Created(instance_id.to_string()))
}

fn require_group<'a>(
    draft: &'a Draft,
    graph_id: &GraphId,
    group_id: &GroupId,
) -> Result<&'a redstring_types::Group, ValidationError> {
    draft
        .require_graph(graph_id)?
        .groups
        .get(group_id)
        .ok_or_else(|| ValidationError::GroupNotFound(group_id.clone()))
}

fn centroid(graph: &Graph, members: &BTreeSet<InstanceId>) -> (f64, f64) {
    let placed: Vec<&NodeInstance> = members
        .iter()
        .filter_map(|m| graph.instances.get(m))
        .collect();
    if placed.is_empty() {
        return (0.0, 0.0);
    }
    let n = placed.len() as f64;
    let x = placed.iter().map(|i| i.x).sum::<f64>() / n;
    let y = placed.iter().map(|i| i.y).sum::<f64>() / n;
    (x, y)
}

/// Edges of the graph touching any member, flagged `true` when both ends
/// are members.
fn partition_edges(
    draft: &Draft,
    graph_id: &GraphId,
    members: &BTreeSet<InstanceId>,
) -> Vec<(EdgeId, bool)> {
    let Some(graph) = draft.state().graph(graph_id) else {
        return Vec::new();
    };
    graph
        .edge_ids
        .iter()
        .filter_map(|eid| draft.state().edge(eid))
        .filter_map(|e| {
            let source_in = members.contains(&e.source_id);
            let destination_in = members.contains(&e.destination_id);
            (source_in || destination_in).then(|| (e.id.clone(), source_in && destination_in))
        })
        .collect()
}

fn remap_arrows(
    directionality: &Directionality,
    map: impl Fn(&InstanceId) -> Option<InstanceId>,
) -> Directionality {
    Directionality {
        arrows_toward: directionality.arrows_toward.iter().filter_map(map).collect(),
    }
}
