#![deny(unsafe_code)]
//! # redstring-types
//!
//! Data model for the Redstring concept graph store.
//!
//! ## Key Types
//!
//! - [`NodePrototype`] / [`EdgePrototype`]: reusable templates forming a type hierarchy
//! - [`Graph`]: a canvas holding [`NodeInstance`]s, [`Group`]s and an ordered edge list
//! - [`Edge`]: a connection between two instances of one graph
//! - [`PendingDeletion`]: a soft-deleted instance inside its grace period
//! - [`StoreState`]: the complete snapshot swapped atomically on commit
//! - [`ChangeContext`] / [`ChangeBatch`]: what committed mutations touched

pub mod change;
pub mod graph;
pub mod ids;
pub mod prototype;
pub mod state;

pub use change::{ChangeBatch, ChangeContext, TargetKind};
pub use graph::{Directionality, Edge, Graph, Group, NodeInstance};
pub use ids::{
    EdgeId, GraphId, GroupId, InstanceId, PrototypeId, BASE_CONNECTION_PROTOTYPE_ID,
    BASE_THING_PROTOTYPE_ID,
};
pub use prototype::{EdgePrototype, NodePrototype, Relationship, SemanticMetadata};
pub use state::{PanelTab, PendingDeletion, StoreState, TabTarget};
