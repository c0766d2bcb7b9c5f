use crate::draft::Draft;
use crate::error::ValidationError;
use crate::gc::Reachability;
use crate::ops::graph;
use crate::request::OutcomeDetail;
use redstring_types::{Graph, GraphId, PrototypeId, TargetKind};
use tracing::debug;

/// Attach a definition graph to a prototype, creating the graph unless an
/// existing id is given, then open it and focus the prototype.
pub(crate) fn create_and_assign(
    draft: &mut Draft,
    prototype_id: &PrototypeId,
    graph_id: Option<GraphId>,
) -> Result<OutcomeDetail, ValidationError> {
    let (name, description, color, existing) = match (
        draft.state().node_prototype(prototype_id),
        draft.state().edge_prototype(prototype_id),
    ) {
        (Some(p), _) => (
            p.name.clone(),
            p.description.clone(),
            p.color.clone(),
            &p.definition_graph_ids,
        ),
        (None, Some(p)) => (
            p.name.clone(),
            p.description.clone(),
            p.color.clone(),
            &p.definition_graph_ids,
        ),
        (None, None) => return Err(ValidationError::PrototypeNotFound(prototype_id.clone())),
    };
    let graph_id = graph_id.unwrap_or_else(GraphId::generate);
    if existing.contains(&graph_id) {
        return Err(ValidationError::AlreadyExists {
            kind: "definition",
            id: graph_id.to_string(),
        });
    }

    if draft.state().graphs.contains_key(&graph_id) {
        let graph = draft.graph_mut(&graph_id)?;
        if !graph.defining_node_ids.contains(prototype_id) {
            graph.defining_node_ids.push(prototype_id.clone());
        }
        draft.record(TargetKind::Graph, &graph_id);
    } else {
        let mut graph = Graph::new(graph_id.clone(), name)
            .with_description(description)
            .with_color(color);
        graph.defining_node_ids.push(prototype_id.clone());
        draft.insert_graph(graph);
    }

    if draft.state().node_prototypes.contains_key(prototype_id) {
        draft
            .node_prototype_mut(prototype_id)?
            .definition_graph_ids
            .push(graph_id.clone());
        draft.record(TargetKind::NodePrototype, prototype_id);
        draft.state_mut().active_definition_node_id = Some(prototype_id.clone());
    } else {
        draft
            .edge_prototype_mut(prototype_id)?
            .definition_graph_ids
            .push(graph_id.clone());
        draft.record(TargetKind::EdgePrototype, prototype_id);
    }

    graph::open_and_activate(draft, &graph_id);
    Ok(OutcomeDetail::Created(graph_id.to_string()))
}

/// Detach a definition graph. A graph no longer defining anything is closed,
/// and deleted unless it is still reachable.
pub(crate) fn remove_definition(
    draft: &mut Draft,
    prototype_id: &PrototypeId,
    graph_id: &GraphId,
) -> Result<OutcomeDetail, ValidationError> {
    let listed = draft
        .state()
        .node_prototype(prototype_id)
        .map(|p| p.definition_graph_ids.contains(graph_id))
        .or_else(|| {
            draft
                .state()
                .edge_prototype(prototype_id)
                .map(|p| p.definition_graph_ids.contains(graph_id))
        })
        .ok_or_else(|| ValidationError::PrototypeNotFound(prototype_id.clone()))?;
    if !listed {
        return Err(ValidationError::NotADefinition {
            prototype: prototype_id.clone(),
            graph: graph_id.clone(),
        });
    }

    draft.detach_definition(prototype_id, graph_id);
    draft.record(TargetKind::NodePrototype, prototype_id);

    let orphaned = draft
        .state()
        .graph(graph_id)
        .map(|g| g.defining_node_ids.is_empty())
        .unwrap_or(false);
    if orphaned {
        graph::close(draft, graph_id);
        if !Reachability::compute(draft.state()).keeps_graph(graph_id) {
            debug!(graph_id = %graph_id, "definition graph no longer referenced");
            draft.remove_graph(graph_id);
        } else {
            draft.record(TargetKind::Graph, graph_id);
        }
    }
    Ok(OutcomeDetail::None)
}
