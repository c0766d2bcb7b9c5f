//! Change contexts emitted by committed mutations

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of entity a mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetKind {
    Graph,
    NodePrototype,
    EdgePrototype,
    Instance,
    Edge,
    Group,
    Tab,
    PendingDeletion,
    Store,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graph => write!(f, "graph"),
            Self::NodePrototype => write!(f, "nodePrototype"),
            Self::EdgePrototype => write!(f, "edgePrototype"),
            Self::Instance => write!(f, "instance"),
            Self::Edge => write!(f, "edge"),
            Self::Group => write!(f, "group"),
            Self::Tab => write!(f, "tab"),
            Self::PendingDeletion => write!(f, "pendingDeletion"),
            Self::Store => write!(f, "store"),
        }
    }
}

/// One tagged change: which operation ran and what it targeted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeContext {
    pub operation: String,
    pub target: TargetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

impl ChangeContext {
    pub fn new(operation: impl Into<String>, target: TargetKind) -> Self {
        Self {
            operation: operation.into(),
            target,
            target_id: None,
        }
    }

    pub fn with_target_id(mut self, id: impl fmt::Display) -> Self {
        self.target_id = Some(id.to_string());
        self
    }
}

/// Contexts coalesced into one notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeBatch {
    /// Monotonic batch counter, starting at 1.
    pub sequence: u64,
    pub contexts: Vec<ChangeContext>,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn touches(&self, target: TargetKind) -> bool {
        self.contexts.iter().any(|c| c.target == target)
    }

    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.contexts.iter().map(|c| c.operation.as_str())
    }
}
