use crate::draft::Draft;
use crate::error::ValidationError;
use crate::integrity::IntegrityGuard;
use crate::request::{GroupPatch, OutcomeDetail};
use redstring_types::{GraphId, Group, GroupId, TargetKind};

pub(crate) fn create_group(
    draft: &mut Draft,
    graph_id: &GraphId,
    group: Group,
) -> Result<OutcomeDetail, ValidationError> {
    let graph = draft.require_graph(graph_id)?;
    if graph.groups.contains_key(&group.id) {
        return Err(ValidationError::AlreadyExists {
            kind: "group",
            id: group.id.to_string(),
        });
    }
    IntegrityGuard::check_members(graph, &group.member_instance_ids)?;
    if let Some(linked) = &group.linked_node_prototype_id {
        let proto = draft.require_node_prototype(linked)?;
        if let Some(index) = group.linked_definition_index {
            if index >= proto.definition_graph_ids.len() {
                return Err(ValidationError::InvalidSelection(format!(
                    "{} has no definition at index {}",
                    linked, index
                )));
            }
        }
    }

    let id = group.id.clone();
    draft.graph_mut(graph_id)?.groups.insert(id.clone(), group);
    draft.record(TargetKind::Group, &id);
    Ok(OutcomeDetail::Created(id.to_string()))
}

pub(crate) fn update_group(
    draft: &mut Draft,
    graph_id: &GraphId,
    group_id: &GroupId,
    patch: GroupPatch,
) -> Result<OutcomeDetail, ValidationError> {
    let graph = draft.require_graph(graph_id)?;
    if !graph.groups.contains_key(group_id) {
        return Err(ValidationError::GroupNotFound(group_id.clone()));
    }
    IntegrityGuard::check_members(graph, &patch.add_members)?;

    let group = draft
        .graph_mut(graph_id)?
        .groups
        .get_mut(group_id)
        .ok_or_else(|| ValidationError::GroupNotFound(group_id.clone()))?;
    if let Some(name) = patch.name {
        group.name = name;
    }
    if let Some(color) = patch.color {
        group.color = color;
    }
    group.member_instance_ids.extend(patch.add_members);
    for member in &patch.remove_members {
        group.member_instance_ids.remove(member);
    }
    draft.record(TargetKind::Group, group_id);
    Ok(OutcomeDetail::None)
}

/// Members stay in the graph; only the grouping goes.
pub(crate) fn delete_group(
    draft: &mut Draft,
    graph_id: &GraphId,
    group_id: &GroupId,
) -> Result<OutcomeDetail, ValidationError> {
    draft
        .graph_mut(graph_id)?
        .groups
        .remove(group_id)
        .ok_or_else(|| ValidationError::GroupNotFound(group_id.clone()))?;
    draft.record(TargetKind::Group, group_id);
    Ok(OutcomeDetail::None)
}
