use redstring_types::{EdgeId, GraphId, GroupId, InstanceId, PrototypeId};

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("a full-store load is already in progress")]
    ConcurrentLoad,
    #[error("store lock poisoned: {0}")]
    Lock(String),
}

impl StoreError {
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(v) => Some(v),
            _ => None,
        }
    }
}

/// A mutation was rejected; the snapshot is unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("graph not found: {0}")]
    GraphNotFound(GraphId),
    #[error("prototype not found: {0}")]
    PrototypeNotFound(PrototypeId),
    #[error("instance not found: {0}")]
    InstanceNotFound(InstanceId),
    #[error("edge not found: {0}")]
    EdgeNotFound(EdgeId),
    #[error("group not found: {0}")]
    GroupNotFound(GroupId),
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },
    #[error("prototype cannot be its own type: {0}")]
    SelfType(PrototypeId),
    #[error("typing {node} as {type_id} would create a cycle")]
    TypeCycle {
        node: PrototypeId,
        type_id: PrototypeId,
    },
    #[error("root prototype cannot be retyped: {0}")]
    ImmutableRootType(PrototypeId),
    #[error("instance {instance} does not belong to graph {graph}")]
    CrossGraphEdge { graph: GraphId, instance: InstanceId },
    #[error("arrow target {0} is not an endpoint of the edge")]
    InvalidArrow(InstanceId),
    #[error("group has no members: {0}")]
    EmptyGroup(GroupId),
    #[error("group is not a node-group: {0}")]
    NotANodeGroup(GroupId),
    #[error("group is already a node-group: {0}")]
    AlreadyNodeGroup(GroupId),
    #[error("graph {graph} is not a definition of {prototype}")]
    NotADefinition {
        prototype: PrototypeId,
        graph: GraphId,
    },
    #[error("abstraction chain not found: {node} / {dimension}")]
    ChainNotFound {
        node: PrototypeId,
        dimension: String,
    },
    #[error("tab index out of range: {0}")]
    TabOutOfRange(usize),
    #[error("the home tab cannot be closed")]
    HomeTabPinned,
    #[error("invalid merge: {0}")]
    InvalidMerge(String),
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
}

/// A defect found while normalizing an imported snapshot. The offending
/// entity is dropped or repaired; the rest of the snapshot still loads.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ImportError {
    #[error("malformed {kind} {id}: {reason}")]
    Malformed {
        kind: &'static str,
        id: String,
        reason: String,
    },
    #[error("{owner} references unknown prototype {prototype}")]
    UnknownPrototype { owner: String, prototype: String },
    #[error("edge {edge} has a dangling endpoint {instance}")]
    DanglingEdge { edge: EdgeId, instance: InstanceId },
    #[error("graph {graph} lists missing edge {edge}")]
    MissingGraphEdge { graph: GraphId, edge: EdgeId },
    #[error("edge {0} is not listed by any graph")]
    UnownedEdge(EdgeId),
    #[error("definition link between {prototype} and {graph} repaired")]
    BrokenDefinitionLink { prototype: String, graph: GraphId },
    #[error("type cycle broken at {0}")]
    TypeCycle(PrototypeId),
    #[error("arrow on edge {edge} toward non-endpoint {instance} dropped")]
    InvalidDirectionality { edge: EdgeId, instance: InstanceId },
    #[error("index {index} references missing {id}")]
    DanglingIndex { index: &'static str, id: String },
    #[error("duplicate instance id {0} dropped")]
    DuplicateInstance(InstanceId),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
