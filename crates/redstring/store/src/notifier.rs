//! Batched change notification
//!
//! Committed mutations enqueue their change contexts here. The coalescing
//! task wakes once per burst, yields so the rest of the burst can land, and
//! delivers everything pending as one [`ChangeBatch`] to every registered
//! [`PersistenceSink`] and to broadcast subscribers.

use redstring_types::{ChangeBatch, ChangeContext, StoreState};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Receives coalesced batches together with the snapshot they produced.
/// Serialization format and save cadence are up to the sink.
pub trait PersistenceSink: Send + Sync {
    fn notify(&self, state: &StoreState, batch: &ChangeBatch);
}

impl<F> PersistenceSink for F
where
    F: Fn(&StoreState, &ChangeBatch) + Send + Sync,
{
    fn notify(&self, state: &StoreState, batch: &ChangeBatch) {
        self(state, batch)
    }
}

pub struct ChangeNotifier {
    pending: Mutex<Vec<ChangeContext>>,
    sinks: RwLock<Vec<Arc<dyn PersistenceSink>>>,
    sender: broadcast::Sender<ChangeBatch>,
    wake: Notify,
    sequence: AtomicU64,
    closed: AtomicBool,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            pending: Mutex::new(Vec::new()),
            sinks: RwLock::new(Vec::new()),
            sender,
            wake: Notify::new(),
            sequence: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn register(&self, sink: Arc<dyn PersistenceSink>) {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    /// Receive every batch delivered after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeBatch> {
        self.sender.subscribe()
    }

    /// Queue contexts from a commit and wake the coalescing task.
    pub fn enqueue(&self, contexts: Vec<ChangeContext>) {
        if contexts.is_empty() || self.is_closed() {
            return;
        }
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(contexts);
        self.wake.notify_one();
    }

    pub fn has_pending(&self) -> bool {
        !self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Deliver everything pending now, as one batch.
    pub fn flush(&self, state: &StoreState) -> Option<ChangeBatch> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let contexts = std::mem::take(&mut *pending);
        drop(pending);
        if contexts.is_empty() {
            return None;
        }
        let batch = ChangeBatch {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            contexts,
        };

        let sinks = self.sinks.read().unwrap_or_else(PoisonError::into_inner).clone();
        for sink in &sinks {
            sink.notify(state, &batch);
        }
        // No receivers is fine.
        let _ = self.sender.send(batch.clone());
        debug!(sequence = batch.sequence, changes = batch.contexts.len(), "change batch delivered");
        Some(batch)
    }

    /// Stop accepting contexts and end the coalescing task.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Run the coalescing loop. `snapshot` supplies the state handed to
    /// sinks; returning `None` (the store is gone) ends the loop.
    pub fn spawn<F>(self: &Arc<Self>, snapshot: F) -> JoinHandle<()>
    where
        F: Fn() -> Option<Arc<StoreState>> + Send + 'static,
    {
        let notifier = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                notifier.wake.notified().await;
                if notifier.is_closed() {
                    break;
                }
                // Let the rest of the current burst of commits enqueue first.
                tokio::task::yield_now().await;
                let Some(state) = snapshot() else {
                    break;
                };
                notifier.flush(&state);
            }
            trace!("change notifier task exited");
        })
    }
}
