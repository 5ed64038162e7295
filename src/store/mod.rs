//! Leader/follower store instances.
//!
//! A store is either a [`LeaderStore`], which applies mutations and
//! broadcasts every new state, or a [`FollowerStore`], which mirrors the
//! leader and forwards its own intents to it. Both implement
//! [`StoreHandle`]; [`UniversalStore`] is the tagged union handed out by the
//! factory, which is the only public way to construct either.
//!
//! # Example
//!
//! ```ignore
//! let channel = LocalChannel::new();
//!
//! let host = UniversalStore::create(
//!     StoreOptions::new("counter", 0).leader(true),
//!     channel.clone(),
//!     Environment::Manager,
//! )?;
//! let preview = UniversalStore::create(
//!     StoreOptions::new("counter", 0),
//!     channel.clone(),
//!     Environment::Preview,
//! )?;
//!
//! host.set_state(5)?;
//! channel.run_until_idle();
//! assert_eq!(preview.get_state(), 5);
//! ```

mod follower;
mod handle;
mod leader;
mod shared;

pub use follower::FollowerStore;
pub use handle::StoreHandle;
pub use leader::LeaderStore;
pub use shared::StateValue;

use crate::channel::Channel;
use crate::error::{Result, StoreError};
use crate::subscriptions::{EventListener, Unsubscribe};
use crate::types::{
    ActorInfo, CustomEvent, Environment, EventInfo, SetStateOutcome, StateUpdate, StoreOptions,
    StoreStatus,
};
use std::sync::Arc;

/// A store instance of either role.
pub enum UniversalStore<S: StateValue> {
    Leader(LeaderStore<S>),
    Follower(FollowerStore<S>),
}

impl<S: StateValue> Clone for UniversalStore<S> {
    fn clone(&self) -> Self {
        match self {
            UniversalStore::Leader(store) => UniversalStore::Leader(store.clone()),
            UniversalStore::Follower(store) => UniversalStore::Follower(store.clone()),
        }
    }
}

impl<S: StateValue> UniversalStore<S> {
    /// Create a store instance on `channel`.
    ///
    /// `options.leader` picks the role. Leaders announce themselves;
    /// followers start a handshake and stay `Syncing` until a leader answers.
    pub fn create<C>(
        options: StoreOptions<S>,
        channel: C,
        environment: Environment,
    ) -> Result<Self>
    where
        C: Channel + 'static,
    {
        validate(&options)?;
        let channel: Arc<dyn Channel> = Arc::new(channel);

        if options.leader {
            LeaderStore::new(options, channel, environment).map(UniversalStore::Leader)
        } else {
            FollowerStore::new(options, channel, environment).map(UniversalStore::Follower)
        }
    }

    pub fn as_leader(&self) -> Option<&LeaderStore<S>> {
        match self {
            UniversalStore::Leader(store) => Some(store),
            UniversalStore::Follower(_) => None,
        }
    }

    pub fn as_follower(&self) -> Option<&FollowerStore<S>> {
        match self {
            UniversalStore::Leader(_) => None,
            UniversalStore::Follower(store) => Some(store),
        }
    }
}

pub(crate) fn validate<S>(options: &StoreOptions<S>) -> Result<()> {
    if options.store_key.trim().is_empty() {
        return Err(StoreError::InvalidConfig(
            "store_key must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn event_listener<F>(event_type: Option<&str>, listener: F) -> EventListener
where
    F: Fn(&CustomEvent, &EventInfo) + Send + Sync + 'static,
{
    EventListener {
        event_type: event_type.map(str::to_string),
        callback: Box::new(listener),
    }
}

macro_rules! delegate {
    ($self:ident, $store:ident => $body:expr) => {
        match $self {
            UniversalStore::Leader($store) => $body,
            UniversalStore::Follower($store) => $body,
        }
    };
}

impl<S: StateValue> StoreHandle<S> for UniversalStore<S> {
    fn store_key(&self) -> &str {
        delegate!(self, store => store.store_key())
    }

    fn actor(&self) -> ActorInfo {
        delegate!(self, store => store.actor())
    }

    fn status(&self) -> StoreStatus {
        delegate!(self, store => store.status())
    }

    fn get_state(&self) -> S {
        delegate!(self, store => store.get_state())
    }

    fn set_state(&self, update: impl Into<StateUpdate<S>>) -> Result<SetStateOutcome> {
        delegate!(self, store => store.set_state(update))
    }

    fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&S, &S) + Send + Sync + 'static,
    {
        delegate!(self, store => store.subscribe(listener))
    }

    fn on_state_change<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&S, &S) + Send + Sync + 'static,
    {
        delegate!(self, store => store.on_state_change(listener))
    }

    fn on_event<F>(&self, event_type: Option<&str>, listener: F) -> Unsubscribe
    where
        F: Fn(&CustomEvent, &EventInfo) + Send + Sync + 'static,
    {
        delegate!(self, store => store.on_event(event_type, listener))
    }

    fn send(&self, event: CustomEvent) -> Result<()> {
        delegate!(self, store => store.send(event))
    }
}
