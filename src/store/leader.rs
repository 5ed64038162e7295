//! The authoritative instance of a store.

use crate::channel::Channel;
use crate::error::Result;
use crate::protocol::{Envelope, ProtocolEvent};
use crate::subscriptions::Unsubscribe;
use crate::types::{
    ActorId, ActorInfo, CustomEvent, Environment, EventInfo, Role, SetStateOutcome,
    StateUpdate, StoreOptions, StoreStatus,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use super::handle::StoreHandle;
use super::shared::{EnvelopeHandler, StateValue, StoreCore};

/// Leaders start one version ahead of followers so the first handshake
/// response always wins over a follower's initial state.
const LEADER_INITIAL_VERSION: u64 = 1;

struct LeaderInner<S: StateValue> {
    core: StoreCore<S>,
    /// Other leaders seen on the same store key.
    rivals: Mutex<HashSet<ActorId>>,
}

/// Applies mutations directly and broadcasts every new state.
///
/// Only obtainable through [`UniversalStore::create`](super::UniversalStore::create)
/// or the mock store. Cloning yields another handle to the same instance.
pub struct LeaderStore<S: StateValue> {
    inner: Arc<LeaderInner<S>>,
}

impl<S: StateValue> Clone for LeaderStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: StateValue> LeaderStore<S> {
    pub(crate) fn new(
        options: StoreOptions<S>,
        channel: Arc<dyn Channel>,
        environment: Environment,
    ) -> Result<Self> {
        let inner = Arc::new(LeaderInner {
            core: StoreCore::new(
                options.store_key,
                options.initial_state,
                LEADER_INITIAL_VERSION,
                Role::Leader,
                environment,
                channel,
            ),
            rivals: Mutex::new(HashSet::new()),
        });
        StoreCore::attach(&inner, &inner.core);

        inner.core.broadcast(ProtocolEvent::LeaderCreated)?;
        tracing::debug!(
            store_key = %inner.core.store_key(),
            actor = %inner.core.actor().id,
            %environment,
            "leader created"
        );

        Ok(Self { inner })
    }

    /// Version of the current state. Increases by one per applied change.
    pub fn version(&self) -> u64 {
        self.inner.core.version()
    }

    /// How many distinct other leaders were seen on this store key.
    pub fn rival_leaders(&self) -> usize {
        self.inner.rivals.lock().len()
    }
}

impl<S: StateValue> LeaderInner<S> {
    /// Compute, assign and broadcast under the write lock, then notify.
    fn apply(&self, update: StateUpdate<S>) -> Result<()> {
        let (state, previous) = {
            let _guard = self.core.write_lock.lock();
            let (previous, version) = self.core.snapshot();
            let state = update.apply(&previous);
            let next_version = version + 1;

            let event = ProtocolEvent::StateUpdate {
                state: StoreCore::encode_state(&state)?,
                previous_state: StoreCore::encode_state(&previous)?,
                version: next_version,
            };
            self.core.replace(state.clone(), next_version);
            self.core.broadcast(event)?;

            tracing::debug!(
                store_key = %self.core.store_key(),
                version = next_version,
                "state applied"
            );
            (state, previous)
        };

        self.core.notify_state(&state, &previous);
        Ok(())
    }

    fn answer_handshake(&self, follower: ActorInfo) -> Result<()> {
        let (state, version) = self.core.snapshot();
        tracing::debug!(
            store_key = %self.core.store_key(),
            follower = %follower.id,
            environment = %follower.environment,
            version,
            "answering handshake"
        );
        self.core.broadcast(ProtocolEvent::ExistingStateResponse {
            state: StoreCore::encode_state(&state)?,
            version,
        })
    }
}

impl<S: StateValue> EnvelopeHandler for LeaderInner<S> {
    fn core_actor(&self) -> ActorId {
        self.core.actor().id
    }

    fn handle(&self, envelope: Envelope) {
        let store_key = self.core.store_key();
        let kind = envelope.event.kind();
        let result = match envelope.event {
            ProtocolEvent::ExistingStateRequest => self.answer_handshake(envelope.actor),
            ProtocolEvent::SetStateRequest { state } => self
                .core
                .decode_state(state)
                .and_then(|state| self.apply(StateUpdate::Value(state))),
            ProtocolEvent::Custom(event) => {
                self.core
                    .notify_event(&event, &EventInfo { actor: envelope.actor });
                Ok(())
            }
            ProtocolEvent::LeaderCreated
            | ProtocolEvent::StateUpdate { .. }
            | ProtocolEvent::ExistingStateResponse { .. } => {
                let first_sighting = envelope.actor.role == Role::Leader
                    && self.rivals.lock().insert(envelope.actor.id);
                if first_sighting {
                    tracing::error!(
                        store_key,
                        rival = %envelope.actor.id,
                        environment = %envelope.actor.environment,
                        kind,
                        "detected another leader for this store; keeping leadership"
                    );
                }
                Ok(())
            }
            ProtocolEvent::FollowerCreated => {
                tracing::debug!(store_key, follower = %envelope.actor.id, "follower joined");
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::warn!(store_key, error = %e, "failed to handle store event");
        }
    }
}

impl<S: StateValue> StoreHandle<S> for LeaderStore<S> {
    fn store_key(&self) -> &str {
        self.inner.core.store_key()
    }

    fn actor(&self) -> ActorInfo {
        self.inner.core.actor()
    }

    fn status(&self) -> StoreStatus {
        StoreStatus::Ready
    }

    fn get_state(&self) -> S {
        self.inner.core.get_state()
    }

    fn set_state(&self, update: impl Into<StateUpdate<S>>) -> Result<SetStateOutcome> {
        self.inner.apply(update.into())?;
        Ok(SetStateOutcome::Applied)
    }

    fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&S, &S) + Send + Sync + 'static,
    {
        self.inner.core.add_state_listener(Arc::new(listener))
    }

    fn on_state_change<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&S, &S) + Send + Sync + 'static,
    {
        self.inner.core.add_state_listener(Arc::new(listener))
    }

    fn on_event<F>(&self, event_type: Option<&str>, listener: F) -> Unsubscribe
    where
        F: Fn(&CustomEvent, &EventInfo) + Send + Sync + 'static,
    {
        self.inner.core.add_event_listener(super::event_listener(event_type, listener))
    }

    fn send(&self, event: CustomEvent) -> Result<()> {
        self.inner.core.send_custom(event)
    }
}
