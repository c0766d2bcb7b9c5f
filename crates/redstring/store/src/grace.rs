//! Soft deletion and the grace-period sweep
//!
//! Live → Pending(timestamp) → Restored | Expired. A soft-deleted instance
//! is moved out of its graph together with the edges touching it and parked
//! in `pending_deletions`. Restoring replays it; once the grace period has
//! elapsed the sweep purges the entry and restoration becomes impossible.

use crate::draft::Draft;
use crate::error::ValidationError;
use crate::request::OutcomeDetail;
use crate::store::GraphStore;
use redstring_types::{Edge, GraphId, InstanceId, PendingDeletion, TargetKind};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{info, warn};

/// Wall-clock milliseconds since the epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn soft_delete(
    draft: &mut Draft,
    graph_id: &GraphId,
    instance_id: &InstanceId,
    timestamp_ms: i64,
) -> Result<OutcomeDetail, ValidationError> {
    let graph = draft.require_graph(graph_id)?;
    if !graph.instances.contains_key(instance_id) {
        return Err(ValidationError::InstanceNotFound(instance_id.clone()));
    }
    let (edge_positions, connected_edges): (Vec<usize>, Vec<Edge>) = graph
        .edge_ids
        .iter()
        .enumerate()
        .filter_map(|(pos, id)| draft.state().edge(id).map(|e| (pos, e)))
        .filter(|(_, e)| e.touches(instance_id))
        .map(|(pos, e)| (pos, e.clone()))
        .unzip();
    let group_memberships = graph
        .groups
        .values()
        .filter(|g| g.member_instance_ids.contains(instance_id))
        .map(|g| g.id.clone())
        .collect();

    let (instance, _) = draft.remove_instance(graph_id, instance_id)?;
    let pending = PendingDeletion {
        instance_id: instance_id.clone(),
        graph_id: graph_id.clone(),
        timestamp_ms,
        instance,
        connected_edges,
        edge_positions,
        group_memberships,
    };
    draft
        .state_mut()
        .pending_deletions
        .insert(instance_id.clone(), Arc::new(pending));
    draft.record(TargetKind::PendingDeletion, instance_id);
    Ok(OutcomeDetail::None)
}

/// Replay a pending deletion. Parts that no longer resolve are skipped with
/// a warning. Without a pending entry this is a no-op.
pub(crate) fn restore(
    draft: &mut Draft,
    instance_id: &InstanceId,
) -> Result<OutcomeDetail, ValidationError> {
    let Some(pending) = draft.state_mut().pending_deletions.remove(instance_id) else {
        warn!(instance_id = %instance_id, "no pending deletion to restore");
        return Ok(OutcomeDetail::Restored(false));
    };
    draft.record(TargetKind::PendingDeletion, instance_id);
    let pending = Arc::unwrap_or_clone(pending);
    let graph_id = &pending.graph_id;

    if draft.state().graph(graph_id).is_none() {
        warn!(
            instance_id = %instance_id,
            graph_id = %graph_id,
            "graph gone, pending deletion discarded"
        );
        return Ok(OutcomeDetail::Restored(false));
    }
    if !draft
        .state()
        .node_prototypes
        .contains_key(&pending.instance.prototype_id)
    {
        warn!(
            instance_id = %instance_id,
            prototype_id = %pending.instance.prototype_id,
            "prototype gone, pending deletion discarded"
        );
        return Ok(OutcomeDetail::Restored(false));
    }

    draft
        .graph_mut(graph_id)?
        .instances
        .insert(instance_id.clone(), pending.instance);
    draft.record(TargetKind::Instance, instance_id);

    let mut positioned: Vec<(usize, Edge)> = pending
        .edge_positions
        .iter()
        .copied()
        .chain(std::iter::repeat(usize::MAX))
        .zip(pending.connected_edges)
        .collect();
    positioned.sort_by_key(|(pos, _)| *pos);

    for (pos, mut edge) in positioned {
        let other = if &edge.source_id == instance_id {
            &edge.destination_id
        } else {
            &edge.source_id
        };
        let graph = draft.require_graph(graph_id)?;
        let endpoint_live = graph.instances.contains_key(other);
        let type_live = edge
            .type_node_id
            .as_ref()
            .map_or(true, |t| draft.state().has_prototype(t));
        if !endpoint_live || !type_live || draft.state().edges.contains_key(&edge.id) {
            warn!(
                edge_id = %edge.id,
                instance_id = %instance_id,
                "saved edge no longer resolves, skipped"
            );
            continue;
        }
        edge.definition_node_ids
            .retain(|p| draft.state().node_prototypes.contains_key(p));

        let edge_id = edge.id.clone();
        let graph = draft.graph_mut(graph_id)?;
        let at = pos.min(graph.edge_ids.len());
        graph.edge_ids.insert(at, edge_id.clone());
        draft.state_mut().edges.insert(edge_id.clone(), Arc::new(edge));
        draft.record(TargetKind::Edge, &edge_id);
    }

    let graph = draft.graph_mut(graph_id)?;
    for group_id in &pending.group_memberships {
        if let Some(group) = graph.groups.get_mut(group_id) {
            group.member_instance_ids.insert(instance_id.clone());
        }
    }
    Ok(OutcomeDetail::Restored(true))
}

/// Purge entries older than the grace period. Returns the purged ids.
pub(crate) fn expire(draft: &mut Draft, now_ms: i64, grace_period_ms: u64) -> Vec<InstanceId> {
    let expired: Vec<InstanceId> = draft
        .state()
        .pending_deletions
        .values()
        .filter(|p| p.is_expired(now_ms, grace_period_ms))
        .map(|p| p.instance_id.clone())
        .collect();
    for id in &expired {
        draft.state_mut().pending_deletions.remove(id);
        draft.record(TargetKind::PendingDeletion, id);
    }
    expired
}

/// Timer-driven sweep of expired soft deletions.
///
/// Pending entries live in the store snapshot, so the timer can be stopped
/// and restarted without losing anything.
pub struct GracePeriodScheduler {
    store: Arc<GraphStore>,
    running: Arc<RwLock<bool>>,
    shutdown: Arc<Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl GracePeriodScheduler {
    pub fn new(store: Arc<GraphStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            running: Arc::new(RwLock::new(false)),
            shutdown: Arc::new(Notify::new()),
            handle: Mutex::new(None),
        })
    }

    /// Start the sweep loop. Returns `false` if it is already running.
    pub async fn start(self: &Arc<Self>) -> bool {
        {
            let mut running = self.running.write().await;
            if *running {
                return false;
            }
            *running = true;
        }

        let period = self.store.config().sweep_interval();
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                // Only the shutdown branch exits, so its permit is always consumed.
                tokio::select! {
                    _ = ticker.tick() => {
                        scheduler.sweep_now();
                    }
                    _ = scheduler.shutdown.notified() => break,
                }
            }
        });

        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        info!(interval_ms = period.as_millis() as u64, "grace period scheduler started");
        true
    }

    /// Stop the sweep loop and wait for it to exit.
    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            if !*running {
                return;
            }
            *running = false;
        }
        self.shutdown.notify_one();

        let handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "grace period sweep task ended abnormally");
            }
        }
        info!("grace period scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Run one sweep against the wall clock.
    pub fn sweep_now(&self) -> Vec<InstanceId> {
        match self.store.sweep_expired(now_ms()) {
            Ok(expired) => {
                if !expired.is_empty() {
                    info!(expired = expired.len(), "expired soft-deleted instances purged");
                }
                expired
            }
            Err(e) => {
                warn!(error = %e, "grace period sweep failed");
                Vec::new()
            }
        }
    }
}
