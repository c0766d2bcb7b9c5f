use crate::draft::Draft;
use crate::error::ValidationError;
use crate::integrity::IntegrityGuard;
use crate::request::{EdgePatch, OutcomeDetail};
use redstring_types::{Edge, EdgeId, GraphId, PrototypeId, TargetKind};

pub(crate) fn add_edge(
    draft: &mut Draft,
    graph_id: &GraphId,
    edge: Edge,
) -> Result<OutcomeDetail, ValidationError> {
    if draft.state().edges.contains_key(&edge.id) {
        return Err(ValidationError::AlreadyExists {
            kind: "edge",
            id: edge.id.to_string(),
        });
    }
    IntegrityGuard::check_edge(draft.state(), graph_id, &edge)?;

    let id = edge.id.clone();
    draft.insert_edge(graph_id, edge)?;
    Ok(OutcomeDetail::Created(id.to_string()))
}

pub(crate) fn update_edge(
    draft: &mut Draft,
    edge_id: &EdgeId,
    patch: EdgePatch,
) -> Result<OutcomeDetail, ValidationError> {
    let mut updated = draft.require_edge(edge_id)?.clone();
    if let Some(directionality) = patch.directionality {
        updated.directionality = directionality;
        IntegrityGuard::check_arrows(&updated)?;
    }
    if let Some(definitions) = patch.definition_node_ids {
        for prototype_id in &definitions {
            draft.require_node_prototype(prototype_id)?;
        }
        updated.definition_node_ids = definitions;
    }
    if let Some(metadata) = patch.metadata {
        updated.metadata = metadata;
    }

    *draft.edge_mut(edge_id)? = updated;
    draft.record(TargetKind::Edge, edge_id);
    Ok(OutcomeDetail::None)
}

/// `None` resets the edge to an untyped connection.
pub(crate) fn set_edge_type(
    draft: &mut Draft,
    edge_id: &EdgeId,
    type_id: Option<PrototypeId>,
) -> Result<OutcomeDetail, ValidationError> {
    draft.require_edge(edge_id)?;
    if let Some(type_id) = &type_id {
        if !draft.state().has_prototype(type_id) {
            return Err(ValidationError::PrototypeNotFound(type_id.clone()));
        }
    }
    draft.edge_mut(edge_id)?.type_node_id = type_id;
    draft.record(TargetKind::Edge, edge_id);
    Ok(OutcomeDetail::None)
}

pub(crate) fn remove_edge(
    draft: &mut Draft,
    edge_id: &EdgeId,
) -> Result<OutcomeDetail, ValidationError> {
    draft
        .remove_edge(edge_id)
        .map(|_| OutcomeDetail::None)
        .ok_or_else(|| ValidationError::EdgeNotFound(edge_id.clone()))
}
