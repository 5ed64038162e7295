//! Ordered listener registry with panic-isolated dispatch.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::types::{ListenerId, Unsubscribe};

/// Holds listeners in registration order.
pub struct ListenerRegistry<L: ?Sized> {
    /// Active listeners by ID. IDs are increasing, so iteration is registration order.
    listeners: RwLock<BTreeMap<ListenerId, Arc<L>>>,
    /// Counter for generating listener IDs.
    next_id: AtomicU64,
    /// Included in logs when a listener panics.
    label: String,
}

impl<L: ?Sized + Send + Sync + 'static> ListenerRegistry<L> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            listeners: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            label: label.into(),
        }
    }

    /// Register a listener. The returned handle only holds a weak reference
    /// to the registry.
    pub fn add(self: &Arc<Self>, listener: Arc<L>) -> Unsubscribe {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().insert(id, listener);

        let registry: Weak<Self> = Arc::downgrade(self);
        Unsubscribe::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(id);
            }
        })
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        self.listeners.write().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Invoke `f` for every listener registered at call time.
    ///
    /// No lock is held while listeners run. A panicking listener is logged
    /// and skipped; the rest still run.
    pub fn dispatch<F>(&self, mut f: F)
    where
        F: FnMut(&L),
    {
        let snapshot: Vec<(ListenerId, Arc<L>)> = self
            .listeners
            .read()
            .iter()
            .map(|(id, l)| (*id, Arc::clone(l)))
            .collect();

        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| f(&*listener))).is_err() {
                tracing::error!(
                    store_key = %self.label,
                    listener = id.0,
                    "listener panicked during dispatch"
                );
            }
        }
    }
}
