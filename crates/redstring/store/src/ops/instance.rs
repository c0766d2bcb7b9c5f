use crate::draft::Draft;
use crate::error::ValidationError;
use crate::request::{InstancePatch, OutcomeDetail};
use redstring_types::{GraphId, InstanceId, NodeInstance, TargetKind};
use tracing::debug;

pub(crate) fn add_node_instance(
    draft: &mut Draft,
    graph_id: &GraphId,
    instance: NodeInstance,
) -> Result<OutcomeDetail, ValidationError> {
    draft.require_graph(graph_id)?;
    draft.require_node_prototype(&instance.prototype_id)?;
    if draft.instance_id_taken(&instance.id) {
        return Err(ValidationError::AlreadyExists {
            kind: "instance",
            id: instance.id.to_string(),
        });
    }

    let id = instance.id.clone();
    draft.graph_mut(graph_id)?.instances.insert(id.clone(), instance);
    draft.record(TargetKind::Instance, &id);
    Ok(OutcomeDetail::Created(id.to_string()))
}

pub(crate) fn update_node_instance(
    draft: &mut Draft,
    graph_id: &GraphId,
    instance_id: &InstanceId,
    patch: InstancePatch,
) -> Result<OutcomeDetail, ValidationError> {
    draft.require_instance(graph_id, instance_id)?;
    let instance = draft
        .graph_mut(graph_id)?
        .instances
        .get_mut(instance_id)
        .ok_or_else(|| ValidationError::InstanceNotFound(instance_id.clone()))?;
    if let Some(x) = patch.x {
        instance.x = x;
    }
    if let Some(y) = patch.y {
        instance.y = y;
    }
    if let Some(scale) = patch.scale {
        instance.scale = scale;
    }
    draft.record(TargetKind::Instance, instance_id);
    Ok(OutcomeDetail::None)
}

/// Hard delete: the instance, every edge touching it and its group
/// memberships go immediately.
pub(crate) fn remove_node_instance(
    draft: &mut Draft,
    graph_id: &GraphId,
    instance_id: &InstanceId,
) -> Result<OutcomeDetail, ValidationError> {
    let (_, edges) = draft.remove_instance(graph_id, instance_id)?;
    debug!(
        graph_id = %graph_id,
        instance_id = %instance_id,
        edges = edges.len(),
        "instance removed"
    );
    Ok(OutcomeDetail::None)
}
