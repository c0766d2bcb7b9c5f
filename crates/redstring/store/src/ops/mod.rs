//! Request handlers
//!
//! Each handler validates its preconditions against the draft before it
//! touches anything, records a change context for every entity it modifies,
//! and returns the operation-specific [`OutcomeDetail`].

pub(crate) mod abstraction;
pub(crate) mod definition;
pub(crate) mod edge;
pub(crate) mod graph;
pub(crate) mod group;
pub(crate) mod instance;
pub(crate) mod prototype;
pub(crate) mod tabs;

use crate::config::StoreConfig;
use crate::draft::Draft;
use crate::error::ValidationError;
use crate::request::{MutationRequest, OutcomeDetail};
use crate::{gc, grace, merge, nodegroup};

/// Route a request to its handler.
pub(crate) fn dispatch(
    draft: &mut Draft,
    request: MutationRequest,
    config: &StoreConfig,
) -> Result<OutcomeDetail, ValidationError> {
    use MutationRequest::*;

    match request {
        CreateNewGraph { graph, open } => graph::create_new_graph(draft, graph, open),
        UpdateGraph { graph_id, patch } => graph::update_graph(draft, &graph_id, patch),
        OpenGraphTab { graph_id } => graph::open_graph_tab(draft, &graph_id),
        CloseGraph { graph_id } => graph::close_graph(draft, &graph_id),
        SetActiveGraph { graph_id } => graph::set_active_graph(draft, &graph_id),
        ToggleGraphExpanded { graph_id } => graph::toggle_graph_expanded(draft, &graph_id),
        ToggleSavedGraph { graph_id } => graph::toggle_saved_graph(draft, &graph_id),

        AddNodePrototype { prototype } => prototype::add_node_prototype(draft, prototype),
        UpdateNodePrototype {
            prototype_id,
            patch,
        } => prototype::update_node_prototype(draft, &prototype_id, patch),
        AddEdgePrototype { prototype } => prototype::add_edge_prototype(draft, prototype),
        UpdateEdgePrototype {
            prototype_id,
            patch,
        } => prototype::update_edge_prototype(draft, &prototype_id, patch),
        SetNodeType { node_id, type_id } => prototype::set_node_type(draft, &node_id, type_id),
        ToggleSavedNode { node_id } => prototype::toggle_saved_node(draft, &node_id),

        AddNodeInstance { graph_id, instance } => {
            instance::add_node_instance(draft, &graph_id, instance)
        }
        UpdateNodeInstance {
            graph_id,
            instance_id,
            patch,
        } => instance::update_node_instance(draft, &graph_id, &instance_id, patch),
        RemoveNodeInstance {
            graph_id,
            instance_id,
        } => instance::remove_node_instance(draft, &graph_id, &instance_id),
        SoftDeleteNodeInstance {
            graph_id,
            instance_id,
            timestamp_ms,
        } => {
            let timestamp_ms = timestamp_ms.unwrap_or_else(grace::now_ms);
            grace::soft_delete(draft, &graph_id, &instance_id, timestamp_ms)
        }
        RestoreNodeInstance { instance_id } => grace::restore(draft, &instance_id),
        ExpirePendingDeletions { now_ms } => {
            let now_ms = now_ms.unwrap_or_else(grace::now_ms);
            Ok(OutcomeDetail::Expired(grace::expire(
                draft,
                now_ms,
                config.grace_period_ms,
            )))
        }

        AddEdge { graph_id, edge } => edge::add_edge(draft, &graph_id, edge),
        UpdateEdge { edge_id, patch } => edge::update_edge(draft, &edge_id, patch),
        SetEdgeType { edge_id, type_id } => edge::set_edge_type(draft, &edge_id, type_id),
        RemoveEdge { edge_id } => edge::remove_edge(draft, &edge_id),

        CreateGroup { graph_id, group } => group::create_group(draft, &graph_id, group),
        UpdateGroup {
            graph_id,
            group_id,
            patch,
        } => group::update_group(draft, &graph_id, &group_id, patch),
        DeleteGroup { graph_id, group_id } => group::delete_group(draft, &graph_id, &group_id),
        ConvertGroupToNodeGroup {
            graph_id,
            group_id,
            prototype,
        } => nodegroup::convert_group_to_node_group(draft, &graph_id, &group_id, prototype),
        ConvertNodeGroupToGroup { graph_id, group_id } => {
            nodegroup::convert_node_group_to_group(draft, &graph_id, &group_id)
        }
        CollapseNodeGroup {
            graph_id,
            group_id,
            instance_id,
        } => nodegroup::collapse_node_group(draft, &graph_id, &group_id, instance_id),

        OpenRightPanelNodeTab { node_id } => tabs::open_node_tab(draft, &node_id),
        CloseRightPanelTab { index } => tabs::close_tab(draft, index),
        ActivateRightPanelTab { index } => tabs::activate_tab(draft, index),

        CreateAndAssignGraphDefinition {
            prototype_id,
            graph_id,
        } => definition::create_and_assign(draft, &prototype_id, graph_id),
        RemoveDefinitionFromNode {
            prototype_id,
            graph_id,
        } => definition::remove_definition(draft, &prototype_id, &graph_id),

        AddToAbstractionChain {
            node_id,
            dimension,
            direction,
            new_node_id,
            insert_relative_to,
        } => abstraction::add_to_chain(
            draft,
            &node_id,
            dimension,
            direction,
            new_node_id,
            insert_relative_to,
        ),
        RemoveFromAbstractionChain {
            node_id,
            dimension,
            remove_node_id,
        } => abstraction::remove_from_chain(draft, &node_id, &dimension, &remove_node_id),

        MergeNodePrototypes {
            primary_id,
            secondary_id,
            strategy,
        } => merge::merge_node_prototypes(draft, &primary_id, &secondary_id, &strategy),
        MergeDefinitionGraphs {
            primary_id,
            secondary_id,
            strategy,
        } => merge::merge_definition_graphs(draft, &primary_id, &secondary_id, &strategy)
            .map(|_| OutcomeDetail::None),

        CleanupOrphanedData => Ok(OutcomeDetail::Gc(gc::collect(draft))),
    }
}
