#![deny(unsafe_code)]
//! # redstring-store
//!
//! Transactional in-memory store for the Redstring concept graph.
//!
//! Every mutation runs against a copy-on-write [`Draft`] of the committed
//! [`StoreState`](redstring_types::StoreState), is validated as it goes, and
//! is swapped in atomically only if it succeeds. Readers hold `Arc`
//! snapshots and never see a half-applied mutation.
//!
//! ## Components
//!
//! - [`GraphStore`]: owns the snapshot; applies [`MutationRequest`]s singly or in batches
//! - [`IntegrityGuard`]: type-cycle, edge and reference checks, plus a full
//!   [`IntegrityGuard::audit`]
//! - [`GracePeriodScheduler`]: timed purge of soft-deleted instances
//! - [`gc`]: reachability-based cleanup of orphaned prototypes and graphs
//! - [`duplicates`]: near-duplicate detection; merges run as
//!   [`MutationRequest::MergeNodePrototypes`]
//! - [`ChangeNotifier`]: coalesces change contexts for [`PersistenceSink`]s
//! - [`import`]: normalization of externally loaded snapshots
//! - [`selectors`]: read-only views for callers
//!
//! ## Example
//!
//! ```
//! use redstring_store::{GraphSpec, GraphStore, MutationRequest};
//!
//! let store = GraphStore::default();
//! store
//!     .apply(MutationRequest::CreateNewGraph {
//!         graph: GraphSpec::named("Ideas"),
//!         open: true,
//!     })
//!     .unwrap();
//! assert_eq!(store.snapshot().open_graph_ids.len(), 1);
//! ```

pub mod config;
pub mod draft;
pub mod duplicates;
pub mod error;
pub mod gc;
pub mod grace;
pub mod import;
pub mod integrity;
pub mod logging;
mod merge;
mod nodegroup;
pub mod notifier;
mod ops;
pub mod request;
pub mod selectors;
pub mod store;

pub use config::{LoggingConfig, StoreConfig};
pub use draft::Draft;
pub use duplicates::{DuplicateCandidate, DuplicateGroup};
pub use error::{ImportError, Result, StoreError, ValidationError};
pub use gc::{GcReport, Reachability};
pub use grace::GracePeriodScheduler;
pub use import::{ImportReport, ImportSnapshot};
pub use integrity::{IntegrityGuard, IntegrityReport, Violation};
pub use notifier::{ChangeNotifier, PersistenceSink};
pub use request::{
    ChainDirection, DefinitionMergeStrategy, EdgePatch, GraphPatch, GraphSpec, GroupPatch,
    InstancePatch, MutationOutcome, MutationRequest, NodeGroupPrototype, OutcomeDetail,
    PrototypePatch,
};
pub use store::{BatchReport, GraphStore, LoadGuard, OperationResult};
