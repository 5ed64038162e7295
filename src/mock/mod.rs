//! Isolated store for tests and stories.
//!
//! A [`MockUniversalStore`] behaves like a leader store with two differences:
//! - It owns a private [`LocalChannel`], so it never interacts with any
//!   other store, and it is always the leader
//! - Created with [`MockUniversalStore::with_recording`], every public call
//!   is recorded for later assertions
//!
//! The private channel is drained after every write, so its queue stays
//! empty however long the mock lives. Reusing one mock across tests means
//! resetting its state yourself.
//!
//! # Example
//!
//! ```ignore
//! let store = MockUniversalStore::with_recording(StoreOptions::new("addon", State::default()));
//!
//! component_under_test(&store);
//! assert_eq!(store.call_count(StoreMethod::SetState), 1);
//!
//! store.mock_clear();
//! store.set_state(State::default())?;
//! ```

mod recorder;

pub use recorder::{Recorded, RecordedUpdate, StoreCall, StoreMethod};

use crate::channel::LocalChannel;
use crate::error::Result;
use crate::store::{LeaderStore, StateValue, StoreHandle};
use crate::subscriptions::Unsubscribe;
use crate::types::{
    ActorInfo, CustomEvent, Environment, EventInfo, SetStateOutcome, StateUpdate, StoreOptions,
    StoreStatus,
};
use std::sync::Arc;

/// A fully isolated leader store with optional call recording.
pub struct MockUniversalStore<S: StateValue> {
    store: Recorded<S, LeaderStore<S>>,
    recording: bool,
    channel: LocalChannel,
}

impl<S: StateValue> MockUniversalStore<S> {
    /// Create a mock store without call recording.
    ///
    /// The `leader` option is ignored: mock stores always lead.
    pub fn create(options: StoreOptions<S>) -> Result<Self> {
        Self::build(options, false)
    }

    /// Create a mock store that records every public call.
    pub fn with_recording(options: StoreOptions<S>) -> Result<Self> {
        Self::build(options, true)
    }

    fn build(options: StoreOptions<S>, recording: bool) -> Result<Self> {
        crate::store::validate(&options)?;
        let channel = LocalChannel::new();
        let leader = LeaderStore::new(
            options.leader(true),
            Arc::new(channel.clone()),
            Environment::Mock,
        )?;
        channel.run_until_idle();

        Ok(Self {
            store: Recorded::new(leader),
            recording,
            channel,
        })
    }

    /// Deliver whatever the last call put on the private channel.
    fn drain<T>(&self, result: Result<T>) -> Result<T> {
        self.channel.run_until_idle();
        result
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// The private channel. Nothing is ever left pending on it.
    pub fn channel(&self) -> &LocalChannel {
        &self.channel
    }

    /// The underlying leader, bypassing recording.
    pub fn leader(&self) -> &LeaderStore<S> {
        self.store.inner()
    }

    /// Recorded calls, oldest first. Empty when not recording.
    pub fn calls(&self) -> Vec<StoreCall<S>> {
        self.store.calls()
    }

    pub fn call_count(&self, method: StoreMethod) -> usize {
        self.store.call_count(method)
    }

    /// Detach every `subscribe`/`on_state_change` listener registered through
    /// this mock and clear the recorded calls. Already-called handles are
    /// skipped silently.
    ///
    /// Does nothing when not recording.
    pub fn mock_clear(&self) {
        if !self.recording {
            return;
        }
        self.store.clear();
        tracing::trace!(store_key = %self.store.store_key(), "mock store cleared");
    }
}

impl<S: StateValue> StoreHandle<S> for MockUniversalStore<S> {
    fn store_key(&self) -> &str {
        self.store.store_key()
    }

    fn actor(&self) -> ActorInfo {
        self.store.actor()
    }

    fn status(&self) -> StoreStatus {
        self.store.status()
    }

    fn get_state(&self) -> S {
        if self.recording {
            self.store.get_state()
        } else {
            self.store.inner().get_state()
        }
    }

    fn set_state(&self, update: impl Into<StateUpdate<S>>) -> Result<SetStateOutcome> {
        let result = if self.recording {
            self.store.set_state(update)
        } else {
            self.store.inner().set_state(update)
        };
        self.drain(result)
    }

    fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&S, &S) + Send + Sync + 'static,
    {
        if self.recording {
            self.store.subscribe(listener)
        } else {
            self.store.inner().subscribe(listener)
        }
    }

    fn on_state_change<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&S, &S) + Send + Sync + 'static,
    {
        if self.recording {
            self.store.on_state_change(listener)
        } else {
            self.store.inner().on_state_change(listener)
        }
    }

    fn on_event<F>(&self, event_type: Option<&str>, listener: F) -> Unsubscribe
    where
        F: Fn(&CustomEvent, &EventInfo) + Send + Sync + 'static,
    {
        if self.recording {
            self.store.on_event(event_type, listener)
        } else {
            self.store.inner().on_event(event_type, listener)
        }
    }

    fn send(&self, event: CustomEvent) -> Result<()> {
        let result = if self.recording {
            self.store.send(event)
        } else {
            self.store.inner().send(event)
        };
        self.drain(result)
    }
}
