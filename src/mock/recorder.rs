//! Call-recording decorator for any [`StoreHandle`].

use crate::error::Result;
use crate::store::StoreHandle;
use crate::subscriptions::Unsubscribe;
use crate::types::{
    ActorInfo, CustomEvent, EventInfo, SetStateOutcome, StateUpdate, StoreStatus,
};
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Which public method a recorded call went through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreMethod {
    GetState,
    SetState,
    Subscribe,
    OnStateChange,
    OnEvent,
    Send,
}

/// The argument given to a recorded `set_state` call.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedUpdate<S> {
    Value(S),
    /// An updater function; closures can't be captured.
    Updater,
}

/// One recorded call: arguments and return value.
#[derive(Clone, Debug)]
pub enum StoreCall<S> {
    GetState {
        returned: S,
    },
    SetState {
        update: RecordedUpdate<S>,
        /// Errors are kept as their message.
        returned: std::result::Result<SetStateOutcome, String>,
    },
    Subscribe {
        returned: Unsubscribe,
    },
    OnStateChange {
        returned: Unsubscribe,
    },
    OnEvent {
        event_type: Option<String>,
        returned: Unsubscribe,
    },
    Send {
        event: CustomEvent,
        returned: std::result::Result<(), String>,
    },
}

impl<S> StoreCall<S> {
    pub fn method(&self) -> StoreMethod {
        match self {
            StoreCall::GetState { .. } => StoreMethod::GetState,
            StoreCall::SetState { .. } => StoreMethod::SetState,
            StoreCall::Subscribe { .. } => StoreMethod::Subscribe,
            StoreCall::OnStateChange { .. } => StoreMethod::OnStateChange,
            StoreCall::OnEvent { .. } => StoreMethod::OnEvent,
            StoreCall::Send { .. } => StoreMethod::Send,
        }
    }

    /// The handle a subscription call returned.
    pub fn unsubscribe(&self) -> Option<&Unsubscribe> {
        match self {
            StoreCall::Subscribe { returned }
            | StoreCall::OnStateChange { returned }
            | StoreCall::OnEvent { returned, .. } => Some(returned),
            _ => None,
        }
    }
}

/// Wraps a store and records every call made through [`StoreHandle`].
///
/// Results are passed through untouched: the `Unsubscribe` a caller gets is
/// the one the inner store created, and the recorded copy shares its identity.
pub struct Recorded<S, H> {
    inner: H,
    calls: Mutex<Vec<StoreCall<S>>>,
    _state: PhantomData<fn() -> S>,
}

impl<S: Clone, H: StoreHandle<S>> Recorded<S, H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            _state: PhantomData,
        }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Snapshot of all recorded calls, oldest first.
    pub fn calls(&self) -> Vec<StoreCall<S>> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, method: StoreMethod) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method() == method)
            .count()
    }

    /// Detach the state listeners registered through this recorder, then
    /// forget all recorded calls. `on_event` handles stay attached. Never panics.
    pub fn clear(&self) {
        let calls = std::mem::take(&mut *self.calls.lock());
        for call in &calls {
            match call {
                StoreCall::Subscribe { returned } | StoreCall::OnStateChange { returned } => {
                    let _ = catch_unwind(AssertUnwindSafe(|| returned.call()));
                }
                _ => {}
            }
        }
    }

    fn record(&self, call: StoreCall<S>) {
        self.calls.lock().push(call);
    }
}

impl<S: Clone, H: StoreHandle<S>> StoreHandle<S> for Recorded<S, H> {
    fn store_key(&self) -> &str {
        self.inner.store_key()
    }

    fn actor(&self) -> ActorInfo {
        self.inner.actor()
    }

    fn status(&self) -> StoreStatus {
        self.inner.status()
    }

    fn get_state(&self) -> S {
        let state = self.inner.get_state();
        self.record(StoreCall::GetState {
            returned: state.clone(),
        });
        state
    }

    fn set_state(&self, update: impl Into<StateUpdate<S>>) -> Result<SetStateOutcome> {
        let update = update.into();
        let recorded = match &update {
            StateUpdate::Value(state) => RecordedUpdate::Value(state.clone()),
            StateUpdate::With(_) => RecordedUpdate::Updater,
        };

        let result = self.inner.set_state(update);
        self.record(StoreCall::SetState {
            update: recorded,
            returned: result.as_ref().copied().map_err(|e| e.to_string()),
        });
        result
    }

    fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&S, &S) + Send + Sync + 'static,
    {
        let unsubscribe = self.inner.subscribe(listener);
        self.record(StoreCall::Subscribe {
            returned: unsubscribe.clone(),
        });
        unsubscribe
    }

    fn on_state_change<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&S, &S) + Send + Sync + 'static,
    {
        let unsubscribe = self.inner.on_state_change(listener);
        self.record(StoreCall::OnStateChange {
            returned: unsubscribe.clone(),
        });
        unsubscribe
    }

    fn on_event<F>(&self, event_type: Option<&str>, listener: F) -> Unsubscribe
    where
        F: Fn(&CustomEvent, &EventInfo) + Send + Sync + 'static,
    {
        let unsubscribe = self.inner.on_event(event_type, listener);
        self.record(StoreCall::OnEvent {
            event_type: event_type.map(str::to_string),
            returned: unsubscribe.clone(),
        });
        unsubscribe
    }

    fn send(&self, event: CustomEvent) -> Result<()> {
        let result = self.inner.send(event.clone());
        self.record(StoreCall::Send {
            event,
            returned: result.as_ref().map(|_| ()).map_err(|e| e.to_string()),
        });
        result
    }
}
