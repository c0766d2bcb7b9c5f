use crate::draft::Draft;
use crate::error::ValidationError;
use crate::request::{GraphPatch, GraphSpec, OutcomeDetail};
use redstring_types::{Graph, GraphId, TargetKind};

pub(crate) fn create_new_graph(
    draft: &mut Draft,
    spec: GraphSpec,
    open: bool,
) -> Result<OutcomeDetail, ValidationError> {
    let id = spec.id.unwrap_or_else(GraphId::generate);
    if draft.state().graphs.contains_key(&id) {
        return Err(ValidationError::AlreadyExists {
            kind: "graph",
            id: id.to_string(),
        });
    }

    let mut graph = Graph::new(id.clone(), spec.name).with_description(spec.description);
    if let Some(color) = spec.color {
        graph.color = color;
    }
    graph.directed = spec.directed;
    draft.insert_graph(graph);

    if open {
        open_and_activate(draft, &id);
    }
    Ok(OutcomeDetail::Created(id.to_string()))
}

pub(crate) fn update_graph(
    draft: &mut Draft,
    graph_id: &GraphId,
    patch: GraphPatch,
) -> Result<OutcomeDetail, ValidationError> {
    let graph = draft.graph_mut(graph_id)?;
    if let Some(name) = patch.name {
        graph.name = name;
    }
    if let Some(description) = patch.description {
        graph.description = description;
    }
    if let Some(color) = patch.color {
        graph.color = color;
    }
    if let Some(directed) = patch.directed {
        graph.directed = directed;
    }
    draft.record(TargetKind::Graph, graph_id);
    Ok(OutcomeDetail::None)
}

pub(crate) fn open_graph_tab(
    draft: &mut Draft,
    graph_id: &GraphId,
) -> Result<OutcomeDetail, ValidationError> {
    draft.require_graph(graph_id)?;
    open_and_activate(draft, graph_id);
    Ok(OutcomeDetail::None)
}

pub(crate) fn close_graph(
    draft: &mut Draft,
    graph_id: &GraphId,
) -> Result<OutcomeDetail, ValidationError> {
    draft.require_graph(graph_id)?;
    if close(draft, graph_id) {
        draft.record(TargetKind::Graph, graph_id);
    }
    Ok(OutcomeDetail::None)
}

pub(crate) fn set_active_graph(
    draft: &mut Draft,
    graph_id: &GraphId,
) -> Result<OutcomeDetail, ValidationError> {
    draft.require_graph(graph_id)?;
    let state = draft.state_mut();
    if !state.open_graph_ids.contains(graph_id) {
        state.open_graph_ids.insert(0, graph_id.clone());
    }
    state.active_graph_id = Some(graph_id.clone());
    draft.record(TargetKind::Graph, graph_id);
    Ok(OutcomeDetail::None)
}

pub(crate) fn toggle_graph_expanded(
    draft: &mut Draft,
    graph_id: &GraphId,
) -> Result<OutcomeDetail, ValidationError> {
    draft.require_graph(graph_id)?;
    let expanded = &mut draft.state_mut().expanded_graph_ids;
    if !expanded.remove(graph_id) {
        expanded.insert(graph_id.clone());
    }
    draft.record(TargetKind::Graph, graph_id);
    Ok(OutcomeDetail::None)
}

pub(crate) fn toggle_saved_graph(
    draft: &mut Draft,
    graph_id: &GraphId,
) -> Result<OutcomeDetail, ValidationError> {
    draft.require_graph(graph_id)?;
    let saved = &mut draft.state_mut().saved_graph_ids;
    if !saved.remove(graph_id) {
        saved.insert(graph_id.clone());
    }
    draft.record(TargetKind::Graph, graph_id);
    Ok(OutcomeDetail::None)
}

/// Put a graph at the front of the open list, expand it and make it active.
pub(crate) fn open_and_activate(draft: &mut Draft, graph_id: &GraphId) {
    let state = draft.state_mut();
    if !state.open_graph_ids.contains(graph_id) {
        state.open_graph_ids.insert(0, graph_id.clone());
    }
    state.expanded_graph_ids.insert(graph_id.clone());
    state.active_graph_id = Some(graph_id.clone());
    draft.record(TargetKind::Graph, graph_id);
}

/// Remove a graph from the open and expanded lists. When it was active, the
/// graph that slides into its slot (or the one before it) becomes active.
///
/// Returns whether the graph was open.
pub(crate) fn close(draft: &mut Draft, graph_id: &GraphId) -> bool {
    let state = draft.state_mut();
    state.expanded_graph_ids.remove(graph_id);
    let Some(pos) = state.open_graph_ids.iter().position(|g| g == graph_id) else {
        return false;
    };
    state.open_graph_ids.remove(pos);
    if state.active_graph_id.as_ref() == Some(graph_id) {
        let next = pos.min(state.open_graph_ids.len().saturating_sub(1));
        state.active_graph_id = state.open_graph_ids.get(next).cloned();
    }
    true
}
