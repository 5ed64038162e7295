//! The capability interface shared by every kind of store.

use crate::error::Result;
use crate::subscriptions::Unsubscribe;
use crate::types::{
    ActorInfo, CustomEvent, Environment, EventInfo, Role, SetStateOutcome, StateUpdate,
    StoreStatus,
};

/// Operations available on any store instance.
pub trait StoreHandle<S> {
    /// Key shared by every instance of this logical store.
    fn store_key(&self) -> &str;

    /// Identity of this instance.
    fn actor(&self) -> ActorInfo;

    fn environment(&self) -> Environment {
        self.actor().environment
    }

    fn is_leader(&self) -> bool {
        self.actor().role == Role::Leader
    }

    fn status(&self) -> StoreStatus;

    /// The last applied state. Never blocks.
    ///
    /// On a follower this does not reflect a `set_state` call until the
    /// leader's broadcast has been delivered.
    fn get_state(&self) -> S;

    /// Request a state change.
    fn set_state(&self, update: impl Into<StateUpdate<S>>) -> Result<SetStateOutcome>;

    /// Listen for applied state changes, called with `(state, previous_state)`.
    fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&S, &S) + Send + Sync + 'static;

    /// Same delivery as [`subscribe`](StoreHandle::subscribe), under a
    /// separate name so call sites can be told apart.
    fn on_state_change<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&S, &S) + Send + Sync + 'static;

    /// Listen for custom events of one type, or of every type with `None`.
    fn on_event<F>(&self, event_type: Option<&str>, listener: F) -> Unsubscribe
    where
        F: Fn(&CustomEvent, &EventInfo) + Send + Sync + 'static;

    /// Relay a custom event to every instance. Local listeners see it once.
    fn send(&self, event: CustomEvent) -> Result<()>;
}
