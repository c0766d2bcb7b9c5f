use crate::draft::Draft;
use crate::error::ValidationError;
use crate::integrity::IntegrityGuard;
use crate::request::{OutcomeDetail, PrototypePatch};
use redstring_types::{EdgePrototype, GraphId, NodePrototype, PrototypeId, TargetKind};

pub(crate) fn add_node_prototype(
    draft: &mut Draft,
    prototype: NodePrototype,
) -> Result<OutcomeDetail, ValidationError> {
    check_new_prototype(draft, &prototype.id, &prototype.definition_graph_ids)?;
    if let Some(type_id) = &prototype.type_node_id {
        if type_id == &prototype.id {
            return Err(ValidationError::SelfType(prototype.id.clone()));
        }
        draft.require_node_prototype(type_id)?;
    }
    if let Some(missing) = prototype
        .abstraction_chains
        .values()
        .flatten()
        .find(|p| *p != &prototype.id && !draft.state().node_prototypes.contains_key(*p))
    {
        return Err(ValidationError::PrototypeNotFound(missing.clone()));
    }

    let id = prototype.id.clone();
    let definitions = prototype.definition_graph_ids.clone();
    draft.insert_node_prototype(prototype);
    link_definitions(draft, &id, &definitions)?;
    Ok(OutcomeDetail::Created(id.to_string()))
}

pub(crate) fn add_edge_prototype(
    draft: &mut Draft,
    prototype: EdgePrototype,
) -> Result<OutcomeDetail, ValidationError> {
    check_new_prototype(draft, &prototype.id, &prototype.definition_graph_ids)?;
    if let Some(type_id) = &prototype.type_node_id {
        if type_id == &prototype.id {
            return Err(ValidationError::SelfType(prototype.id.clone()));
        }
        if !draft.state().edge_prototypes.contains_key(type_id) {
            return Err(ValidationError::PrototypeNotFound(type_id.clone()));
        }
    }

    let id = prototype.id.clone();
    let definitions = prototype.definition_graph_ids.clone();
    draft.insert_edge_prototype(prototype);
    link_definitions(draft, &id, &definitions)?;
    Ok(OutcomeDetail::Created(id.to_string()))
}

fn check_new_prototype(
    draft: &Draft,
    id: &PrototypeId,
    definitions: &[GraphId],
) -> Result<(), ValidationError> {
    if draft.state().has_prototype(id) {
        return Err(ValidationError::AlreadyExists {
            kind: "prototype",
            id: id.to_string(),
        });
    }
    for graph_id in definitions {
        draft.require_graph(graph_id)?;
    }
    Ok(())
}

/// Record the back-reference on each definition graph.
fn link_definitions(
    draft: &mut Draft,
    prototype_id: &PrototypeId,
    definitions: &[GraphId],
) -> Result<(), ValidationError> {
    for graph_id in definitions {
        let graph = draft.graph_mut(graph_id)?;
        if !graph.defining_node_ids.contains(prototype_id) {
            graph.defining_node_ids.push(prototype_id.clone());
        }
        draft.record(TargetKind::Graph, graph_id);
    }
    Ok(())
}

pub(crate) fn update_node_prototype(
    draft: &mut Draft,
    prototype_id: &PrototypeId,
    patch: PrototypePatch,
) -> Result<OutcomeDetail, ValidationError> {
    let proto = draft.node_prototype_mut(prototype_id)?;
    apply_patch(
        patch,
        &mut proto.name,
        &mut proto.description,
        &mut proto.color,
        &mut proto.semantic,
    );
    draft.record(TargetKind::NodePrototype, prototype_id);
    Ok(OutcomeDetail::None)
}

pub(crate) fn update_edge_prototype(
    draft: &mut Draft,
    prototype_id: &PrototypeId,
    patch: PrototypePatch,
) -> Result<OutcomeDetail, ValidationError> {
    let proto = draft.edge_prototype_mut(prototype_id)?;
    apply_patch(
        patch,
        &mut proto.name,
        &mut proto.description,
        &mut proto.color,
        &mut proto.semantic,
    );
    draft.record(TargetKind::EdgePrototype, prototype_id);
    Ok(OutcomeDetail::None)
}

fn apply_patch(
    patch: PrototypePatch,
    name: &mut String,
    description: &mut String,
    color: &mut String,
    semantic: &mut redstring_types::SemanticMetadata,
) {
    if let Some(value) = patch.name {
        *name = value;
    }
    if let Some(value) = patch.description {
        *description = value;
    }
    if let Some(value) = patch.color {
        *color = value;
    }
    if let Some(value) = patch.semantic {
        *semantic = value;
    }
}

pub(crate) fn set_node_type(
    draft: &mut Draft,
    node_id: &PrototypeId,
    type_id: Option<PrototypeId>,
) -> Result<OutcomeDetail, ValidationError> {
    IntegrityGuard::check_set_type(draft.state(), node_id, type_id.as_ref())?;

    if draft.state().node_prototypes.contains_key(node_id) {
        draft.node_prototype_mut(node_id)?.type_node_id = type_id;
        draft.record(TargetKind::NodePrototype, node_id);
    } else {
        draft.edge_prototype_mut(node_id)?.type_node_id = type_id;
        draft.record(TargetKind::EdgePrototype, node_id);
    }
    Ok(OutcomeDetail::None)
}

pub(crate) fn toggle_saved_node(
    draft: &mut Draft,
    node_id: &PrototypeId,
) -> Result<OutcomeDetail, ValidationError> {
    draft.require_node_prototype(node_id)?;
    let saved = &mut draft.state_mut().saved_node_ids;
    if !saved.remove(node_id) {
        saved.insert(node_id.clone());
    }
    draft.record(TargetKind::NodePrototype, node_id);
    Ok(OutcomeDetail::None)
}
