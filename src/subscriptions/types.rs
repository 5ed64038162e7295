//! Listener and subscription handle types.

use crate::types::{CustomEvent, EventInfo};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Unique identifier for a listener within one registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

/// Called with `(state, previous_state)` after every applied change.
pub type StateListener<S> = dyn Fn(&S, &S) + Send + Sync;

/// A custom event listener, optionally restricted to one event type.
pub struct EventListener {
    /// `None` receives every custom event.
    pub event_type: Option<String>,
    pub callback: Box<dyn Fn(&CustomEvent, &EventInfo) + Send + Sync>,
}

impl EventListener {
    pub fn matches(&self, event: &CustomEvent) -> bool {
        self.event_type
            .as_deref()
            .map_or(true, |wanted| wanted == event.event_type)
    }
}

struct UnsubscribeInner {
    done: AtomicBool,
    detach: Box<dyn Fn() + Send + Sync>,
}

/// Handle returned by every subscription.
///
/// Calling it detaches the listener. Further calls, calls on clones, and
/// calls after the store is gone are no-ops. Clones share identity.
#[derive(Clone)]
pub struct Unsubscribe {
    inner: Arc<UnsubscribeInner>,
}

impl Unsubscribe {
    pub(crate) fn new(detach: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(UnsubscribeInner {
                done: AtomicBool::new(false),
                detach: Box::new(detach),
            }),
        }
    }

    /// Detach the listener.
    pub fn call(&self) {
        if !self.inner.done.swap(true, Ordering::SeqCst) {
            (self.inner.detach)();
        }
    }

    /// Whether this handle (or a clone) was already called.
    pub fn is_called(&self) -> bool {
        self.inner.done.load(Ordering::SeqCst)
    }

    /// Whether two handles refer to the same subscription.
    pub fn ptr_eq(&self, other: &Unsubscribe) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("called", &self.is_called())
            .finish()
    }
}
