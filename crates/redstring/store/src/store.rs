//! The graph store
//!
//! Writers are serialized by a mutex held across the whole
//! draft → validate → commit cycle. The committed snapshot sits behind an
//! `RwLock<Arc<StoreState>>` that is held only long enough to clone or swap
//! the pointer, so readers never block on a mutation in progress and never
//! observe a partial one.

use crate::config::StoreConfig;
use crate::draft::Draft;
use crate::duplicates::{self, DuplicateGroup};
use crate::error::{Result, StoreError, ValidationError};
use crate::gc::{self, GcReport};
use crate::grace;
use crate::import::{self, ImportReport, ImportSnapshot};
use crate::integrity::{IntegrityGuard, IntegrityReport};
use crate::notifier::ChangeNotifier;
use crate::ops;
use crate::request::{MutationOutcome, MutationRequest, OutcomeDetail};
use redstring_types::{ChangeBatch, ChangeContext, InstanceId, StoreState, TargetKind};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Result of one operation inside [`GraphStore::apply_batch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub index: usize,
    pub action: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-operation report for a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<OperationResult>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }
}

/// Held for the duration of a full-store load.
pub struct LoadGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

pub struct GraphStore {
    config: StoreConfig,
    root: RwLock<Arc<StoreState>>,
    writer: Mutex<()>,
    loading: AtomicBool,
    notifier: Arc<ChangeNotifier>,
}

impl GraphStore {
    /// An empty store seeded with the root prototypes.
    pub fn new(config: StoreConfig) -> Self {
        Self::with_state(config, StoreState::seeded())
    }

    /// Start from an existing state. Missing root prototypes are re-added;
    /// nothing else is validated, so untrusted input should go through
    /// [`GraphStore::load_snapshot`] instead.
    pub fn with_state(config: StoreConfig, mut state: StoreState) -> Self {
        state.ensure_roots();
        let notifier = Arc::new(ChangeNotifier::new(config.notify_channel_capacity));
        Self {
            config,
            root: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
            loading: AtomicBool::new(false),
            notifier,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// The current committed snapshot.
    pub fn snapshot(&self) -> Arc<StoreState> {
        Arc::clone(&self.root.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Apply one named mutation.
    pub fn apply(&self, request: MutationRequest) -> Result<MutationOutcome> {
        let config = &self.config;
        let (detail, changes) = self.transact(request.action_name(), |draft| {
            ops::dispatch(draft, request, config)
        })?;
        Ok(MutationOutcome { changes, detail })
    }

    /// Run `mutate` against a fresh draft and commit it if it succeeds.
    ///
    /// A rejected mutation leaves the snapshot untouched and is logged at
    /// `warn`. Successful drafts are always committed; an empty change list
    /// marks a no-op.
    pub fn transact<T, F>(
        &self,
        operation: &'static str,
        mutate: F,
    ) -> Result<(T, Vec<ChangeContext>)>
    where
        F: FnOnce(&mut Draft) -> std::result::Result<T, ValidationError>,
    {
        let _writer = self
            .writer
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        let base = self.snapshot();
        let mut draft = Draft::new(&base, operation);

        let value = match mutate(&mut draft) {
            Ok(value) => value,
            Err(e) => {
                warn!(operation, error = %e, "mutation rejected");
                return Err(e.into());
            }
        };

        let (state, changes) = draft.into_parts();
        self.commit(state)?;
        if changes.is_empty() {
            debug!(operation, "mutation was a no-op");
        } else {
            debug!(operation, changes = changes.len(), "mutation committed");
            self.notifier.enqueue(changes.clone());
        }
        Ok((value, changes))
    }

    fn commit(&self, state: StoreState) -> Result<()> {
        let mut root = self
            .root
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        *root = Arc::new(state);
        Ok(())
    }

    /// Apply requests in order. A failure is reported and the rest still run.
    pub fn apply_batch(&self, requests: Vec<MutationRequest>) -> BatchReport {
        let results = requests
            .into_iter()
            .enumerate()
            .map(|(index, request)| {
                let action = request.action_name().to_string();
                match self.apply(request) {
                    Ok(_) => OperationResult {
                        index,
                        action,
                        success: true,
                        error: None,
                    },
                    Err(e) => OperationResult {
                        index,
                        action,
                        success: false,
                        error: Some(e.to_string()),
                    },
                }
            })
            .collect();
        let report = BatchReport { results };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "batch applied"
        );
        report
    }

    /// Claim the single load slot. Fails immediately if a load is running.
    pub fn try_begin_load(&self) -> Result<LoadGuard<'_>> {
        self.loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| StoreError::ConcurrentLoad)?;
        Ok(LoadGuard { flag: &self.loading })
    }

    /// Replace the whole state with a normalized import.
    pub fn load_snapshot(&self, snapshot: ImportSnapshot) -> Result<ImportReport> {
        let _load = self.try_begin_load()?;
        let (state, errors) = import::normalize(snapshot);
        let report = ImportReport::new(&state, errors);

        let _writer = self
            .writer
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        self.commit(state)?;
        self.notifier
            .enqueue(vec![ChangeContext::new("loadSnapshot", TargetKind::Store)]);
        info!(
            graphs = report.graphs,
            prototypes = report.prototypes,
            edges = report.edges,
            defects = report.errors.len(),
            "snapshot loaded"
        );
        Ok(report)
    }

    pub fn collect_garbage(&self) -> Result<GcReport> {
        let (report, _) = self.transact("cleanupOrphanedData", |draft| Ok(gc::collect(draft)))?;
        Ok(report)
    }

    /// Duplicate scan of the current snapshot. `None` uses the configured
    /// threshold.
    pub fn find_potential_duplicates(&self, threshold: Option<f64>) -> Vec<DuplicateGroup> {
        let threshold = threshold.unwrap_or(self.config.duplicate_threshold);
        duplicates::find_potential_duplicates(&self.snapshot(), threshold)
    }

    /// Purge pending deletions older than the grace period as of `now_ms`.
    pub fn sweep_expired(&self, now_ms: i64) -> Result<Vec<InstanceId>> {
        let grace_period_ms = self.config.grace_period_ms;
        let (expired, _) = self.transact("expirePendingDeletions", |draft| {
            Ok(grace::expire(draft, now_ms, grace_period_ms))
        })?;
        Ok(expired)
    }

    /// Restore a soft-deleted instance. `false` if nothing was pending.
    pub fn restore(&self, instance_id: &InstanceId) -> Result<bool> {
        let outcome = self.apply(MutationRequest::RestoreNodeInstance {
            instance_id: instance_id.clone(),
        })?;
        Ok(matches!(outcome.detail, OutcomeDetail::Restored(true)))
    }

    pub fn audit(&self) -> IntegrityReport {
        IntegrityGuard::audit(&self.snapshot())
    }

    /// Deliver pending change contexts now.
    pub fn flush_notifications(&self) -> Option<ChangeBatch> {
        self.notifier.flush(&self.snapshot())
    }

    /// Start the coalescing notification task. It ends when the store is
    /// dropped.
    pub fn spawn_notifier(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        self.notifier
            .spawn(move || store.upgrade().map(|store| store.snapshot()))
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl Drop for GraphStore {
    fn drop(&mut self) {
        self.notifier.close();
    }
}
