//! Tagged mutation requests
//!
//! Every named mutation is one variant of [`MutationRequest`]. Requests
//! arrive either from typed Rust callers or as JSON from a remote agent
//! (`{"action": "addNodeInstance", "graphId": ..., ...}`), and are validated
//! at dispatch.

use crate::gc::GcReport;
use redstring_types::{
    ChangeContext, Directionality, Edge, EdgeId, EdgePrototype, Group, GroupId, GraphId,
    InstanceId, NodeInstance, NodePrototype, PrototypeId, SemanticMetadata,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fields for a new graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSpec {
    #[serde(default)]
    pub id: Option<GraphId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default = "default_true")]
    pub directed: bool,
}

impl GraphSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            color: None,
            directed: true,
        }
    }

    pub fn with_id(mut self, id: GraphId) -> Self {
        self.id = Some(id);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub directed: Option<bool>,
}

/// Partial update shared by node and edge prototypes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrototypePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub semantic: Option<SemanticMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstancePatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub scale: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgePatch {
    pub directionality: Option<Directionality>,
    pub definition_node_ids: Option<Vec<PrototypeId>>,
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub add_members: Vec<InstanceId>,
    pub remove_members: Vec<InstanceId>,
}

/// Which prototype a converted node-group stands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum NodeGroupPrototype {
    Existing { prototype_id: PrototypeId },
    New { prototype: NodePrototype },
}

/// Where a new abstraction-chain member goes relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChainDirection {
    /// More generic: inserted before the anchor.
    Above,
    /// More specific: inserted after the anchor.
    Below,
}

/// How definition graphs of two merged prototypes are reconciled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionMergeStrategy {
    /// Keep the definitions of both.
    #[default]
    Combine,
    OverwriteWithPrimary,
    OverwriteWithSecondary,
    /// Keep only the listed graphs.
    Selective { graph_ids: Vec<GraphId> },
}

/// A named mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MutationRequest {
    // Graphs
    CreateNewGraph {
        graph: GraphSpec,
        #[serde(default = "default_true")]
        open: bool,
    },
    UpdateGraph { graph_id: GraphId, patch: GraphPatch },
    OpenGraphTab { graph_id: GraphId },
    CloseGraph { graph_id: GraphId },
    SetActiveGraph { graph_id: GraphId },
    ToggleGraphExpanded { graph_id: GraphId },
    ToggleSavedGraph { graph_id: GraphId },

    // Prototypes
    AddNodePrototype { prototype: NodePrototype },
    UpdateNodePrototype { prototype_id: PrototypeId, patch: PrototypePatch },
    AddEdgePrototype { prototype: EdgePrototype },
    UpdateEdgePrototype { prototype_id: PrototypeId, patch: PrototypePatch },
    SetNodeType {
        node_id: PrototypeId,
        #[serde(default)]
        type_id: Option<PrototypeId>,
    },
    ToggleSavedNode { node_id: PrototypeId },

    // Instances
    AddNodeInstance { graph_id: GraphId, instance: NodeInstance },
    UpdateNodeInstance {
        graph_id: GraphId,
        instance_id: InstanceId,
        patch: InstancePatch,
    },
    RemoveNodeInstance { graph_id: GraphId, instance_id: InstanceId },
    SoftDeleteNodeInstance {
        graph_id: GraphId,
        instance_id: InstanceId,
        #[serde(default)]
        timestamp_ms: Option<i64>,
    },
    RestoreNodeInstance { instance_id: InstanceId },
    ExpirePendingDeletions {
        #[serde(default)]
        now_ms: Option<i64>,
    },

    // Edges
    AddEdge { graph_id: GraphId, edge: Edge },
    UpdateEdge { edge_id: EdgeId, patch: EdgePatch },
    SetEdgeType {
        edge_id: EdgeId,
        #[serde(default)]
        type_id: Option<PrototypeId>,
    },
    RemoveEdge { edge_id: EdgeId },

    // Groups
    CreateGroup { graph_id: GraphId, group: Group },
    UpdateGroup {
        graph_id: GraphId,
        group_id: GroupId,
        patch: GroupPatch,
    },
    DeleteGroup { graph_id: GraphId, group_id: GroupId },
    ConvertGroupToNodeGroup {
        graph_id: GraphId,
        group_id: GroupId,
        prototype: NodeGroupPrototype,
    },
    ConvertNodeGroupToGroup { graph_id: GraphId, group_id: GroupId },
    CollapseNodeGroup {
        graph_id: GraphId,
        group_id: GroupId,
        #[serde(default)]
        instance_id: Option<InstanceId>,
    },

    // Right-panel tabs
    OpenRightPanelNodeTab { node_id: PrototypeId },
    CloseRightPanelTab { index: usize },
    ActivateRightPanelTab { index: usize },

    // Definitions
    CreateAndAssignGraphDefinition {
        prototype_id: PrototypeId,
        #[serde(default)]
        graph_id: Option<GraphId>,
    },
    RemoveDefinitionFromNode { prototype_id: PrototypeId, graph_id: GraphId },

    // Abstraction chains
    AddToAbstractionChain {
        node_id: PrototypeId,
        dimension: String,
        direction: ChainDirection,
        new_node_id: PrototypeId,
        #[serde(default)]
        insert_relative_to: Option<PrototypeId>,
    },
    RemoveFromAbstractionChain {
        node_id: PrototypeId,
        dimension: String,
        remove_node_id: PrototypeId,
    },

    // Merges
    MergeNodePrototypes {
        primary_id: PrototypeId,
        secondary_id: PrototypeId,
        #[serde(default)]
        strategy: DefinitionMergeStrategy,
    },
    MergeDefinitionGraphs {
        primary_id: PrototypeId,
        secondary_id: PrototypeId,
        #[serde(default)]
        strategy: DefinitionMergeStrategy,
    },

    // Maintenance
    CleanupOrphanedData,
}

impl MutationRequest {
    /// The wire name of the action, as used in change contexts and logs.
    pub fn action_name(&self) -> &'static str {
        match self {
            Self::CreateNewGraph { .. } => "createNewGraph",
            Self::UpdateGraph { .. } => "updateGraph",
            Self::OpenGraphTab { .. } => "openGraphTab",
            Self::CloseGraph { .. } => "closeGraph",
            Self::SetActiveGraph { .. } => "setActiveGraph",
            Self::ToggleGraphExpanded { .. } => "toggleGraphExpanded",
            Self::ToggleSavedGraph { .. } => "toggleSavedGraph",
            Self::AddNodePrototype { .. } => "addNodePrototype",
            Self::UpdateNodePrototype { .. } => "updateNodePrototype",
            Self::AddEdgePrototype { .. } => "addEdgePrototype",
            Self::UpdateEdgePrototype { .. } => "updateEdgePrototype",
            Self::SetNodeType { .. } => "setNodeType",
            Self::ToggleSavedNode { .. } => "toggleSavedNode",
            Self::AddNodeInstance { .. } => "addNodeInstance",
            Self::UpdateNodeInstance { .. } => "updateNodeInstance",
            Self::RemoveNodeInstance { .. } => "removeNodeInstance",
            Self::SoftDeleteNodeInstance { .. } => "softDeleteNodeInstance",
            Self::RestoreNodeInstance { .. } => "restoreNodeInstance",
            Self::ExpirePendingDeletions { .. } => "expirePendingDeletions",
            Self::AddEdge { .. } => "addEdge",
            Self::UpdateEdge { .. } => "updateEdge",
            Self::SetEdgeType { .. } => "setEdgeType",
            Self::RemoveEdge { .. } => "removeEdge",
            Self::CreateGroup { .. } => "createGroup",
            Self::UpdateGroup { .. } => "updateGroup",
            Self::DeleteGroup { .. } => "deleteGroup",
            Self::ConvertGroupToNodeGroup { .. } => "convertGroupToNodeGroup",
            Self::ConvertNodeGroupToGroup { .. } => "convertNodeGroupToGroup",
            Self::CollapseNodeGroup { .. } => "collapseNodeGroup",
            Self::OpenRightPanelNodeTab { .. } => "openRightPanelNodeTab",
            Self::CloseRightPanelTab { .. } => "closeRightPanelTab",
            Self::ActivateRightPanelTab { .. } => "activateRightPanelTab",
            Self::CreateAndAssignGraphDefinition { .. } => "createAndAssignGraphDefinition",
            Self::RemoveDefinitionFromNode { .. } => "removeDefinitionFromNode",
            Self::AddToAbstractionChain { .. } => "addToAbstractionChain",
            Self::RemoveFromAbstractionChain { .. } => "removeFromAbstractionChain",
            Self::MergeNodePrototypes { .. } => "mergeNodePrototypes",
            Self::MergeDefinitionGraphs { .. } => "mergeDefinitionGraphs",
            Self::CleanupOrphanedData => "cleanupOrphanedData",
        }
    }
}

/// Operation-specific result data.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum OutcomeDetail {
    #[default]
    None,
    /// The id an operation generated (new graph, new instance, ...).
    Created(String),
    Gc(GcReport),
    Expired(Vec<InstanceId>),
    Restored(bool),
}

/// A committed mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationOutcome {
    pub changes: Vec<ChangeContext>,
    pub detail: OutcomeDetail,
}

impl MutationOutcome {
    /// True if the mutation touched nothing (a logged no-op).
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

fn default_true() -> bool {
    true
}
