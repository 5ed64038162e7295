//! State, listeners and channel plumbing shared by leaders and followers.

use crate::channel::{Channel, ChannelEvent, HandlerId};
use crate::error::{Result, StoreError};
use crate::protocol::{channel_event_name, Envelope, ProtocolEvent};
use crate::subscriptions::{EventListener, ListenerRegistry, StateListener, Unsubscribe};
use crate::types::{ActorId, ActorInfo, CustomEvent, Environment, EventInfo, Role};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, Weak};

/// Bounds every store state type must satisfy.
pub trait StateValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> StateValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// The applied state and the leader version it corresponds to.
pub(crate) struct Versioned<S> {
    pub state: S,
    pub version: u64,
}

/// Receives decoded envelopes for one instance.
pub(crate) trait EnvelopeHandler: Send + Sync + 'static {
    fn core_actor(&self) -> ActorId;
    fn handle(&self, envelope: Envelope);
}

pub(crate) struct StoreCore<S: StateValue> {
    store_key: String,
    actor: ActorInfo,
    channel: Arc<dyn Channel>,
    event_name: String,

    state: RwLock<Versioned<S>>,

    /// Serializes local writes: compute, assign and broadcast happen under it.
    pub write_lock: Mutex<()>,

    /// Shared by `subscribe` and `on_state_change`.
    state_listeners: Arc<ListenerRegistry<StateListener<S>>>,
    event_listeners: Arc<ListenerRegistry<EventListener>>,

    handler: Mutex<Option<HandlerId>>,
}

impl<S: StateValue> StoreCore<S> {
    pub fn new(
        store_key: String,
        initial_state: S,
        initial_version: u64,
        role: Role,
        environment: Environment,
        channel: Arc<dyn Channel>,
    ) -> Self {
        let event_name = channel_event_name(&store_key);
        Self {
            actor: ActorInfo {
                id: ActorId::random(),
                role,
                environment,
            },
            channel,
            event_name,
            state: RwLock::new(Versioned {
                state: initial_state,
                version: initial_version,
            }),
            write_lock: Mutex::new(()),
            state_listeners: Arc::new(ListenerRegistry::new(store_key.clone())),
            event_listeners: Arc::new(ListenerRegistry::new(store_key.clone())),
            handler: Mutex::new(None),
            store_key,
        }
    }

    /// Route channel events for this store to `owner`.
    ///
    /// The channel only holds a weak reference, so dropping the last handle
    /// to the owner detaches it.
    pub fn attach<H: EnvelopeHandler>(owner: &Arc<H>, core: &StoreCore<S>) {
        let weak: Weak<H> = Arc::downgrade(owner);
        let store_key = core.store_key.clone();
        let id = core.channel.on(
            &core.event_name,
            Arc::new(move |event: &ChannelEvent| {
                let Some(owner) = weak.upgrade() else {
                    return;
                };
                match Envelope::decode(event) {
                    // Our own broadcast looped back by the transport.
                    Ok(envelope) if envelope.actor.id == owner.core_actor() => {}
                    Ok(envelope) => owner.handle(envelope),
                    Err(e) => {
                        tracing::warn!(
                            store_key = %store_key,
                            error = %e,
                            "dropping malformed store event"
                        );
                    }
                }
            }),
        );
        *core.handler.lock() = Some(id);
    }

    pub fn store_key(&self) -> &str {
        &self.store_key
    }

    pub fn actor(&self) -> ActorInfo {
        self.actor
    }

    pub fn get_state(&self) -> S {
        self.state.read().state.clone()
    }

    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    /// Replace the state. Returns the previous state.
    pub fn replace(&self, state: S, version: u64) -> S {
        let mut current = self.state.write();
        current.version = version;
        std::mem::replace(&mut current.state, state)
    }

    /// Read both the state and its version under one lock.
    pub fn snapshot(&self) -> (S, u64) {
        let current = self.state.read();
        (current.state.clone(), current.version)
    }

    // --- Listeners ---

    pub fn add_state_listener(&self, listener: Arc<StateListener<S>>) -> Unsubscribe {
        self.state_listeners.add(listener)
    }

    pub fn add_event_listener(&self, listener: EventListener) -> Unsubscribe {
        self.event_listeners.add(Arc::new(listener))
    }

    pub fn notify_state(&self, state: &S, previous: &S) {
        self.state_listeners.dispatch(|listener| listener(state, previous));
    }

    pub fn notify_event(&self, event: &CustomEvent, info: &EventInfo) {
        self.event_listeners.dispatch(|listener| {
            if listener.matches(event) {
                (listener.callback)(event, info);
            }
        });
    }

    // --- Channel ---

    pub fn broadcast(&self, event: ProtocolEvent) -> Result<()> {
        let kind = event.kind();
        let envelope = Envelope {
            store_key: self.store_key.clone(),
            actor: self.actor,
            event,
        };
        self.channel.send(envelope.encode()?);
        tracing::trace!(
            store_key = %self.store_key,
            actor = %self.actor.id,
            kind,
            "sent store event"
        );
        Ok(())
    }

    /// Relay a custom event and deliver it to local listeners once.
    pub fn send_custom(&self, event: CustomEvent) -> Result<()> {
        self.broadcast(ProtocolEvent::Custom(event.clone()))?;
        self.notify_event(&event, &EventInfo { actor: self.actor });
        Ok(())
    }

    pub fn encode_state(state: &S) -> Result<serde_json::Value> {
        serde_json::to_value(state).map_err(StoreError::encode)
    }

    pub fn decode_state(&self, value: serde_json::Value) -> Result<S> {
        serde_json::from_value(value).map_err(StoreError::decode)
    }
}

impl<S: StateValue> Drop for StoreCore<S> {
    fn drop(&mut self) {
        if let Some(id) = self.handler.lock().take() {
            self.channel.off(&self.event_name, id);
        }
    }
}
