//! Instances that mirror the leader's state.

use crate::channel::Channel;
use crate::error::{Result, StoreError};
use crate::protocol::{Envelope, ProtocolEvent};
use crate::subscriptions::Unsubscribe;
use crate::types::{
    ActorId, ActorInfo, CustomEvent, Environment, EventInfo, Role, SetStateOutcome,
    StateUpdate, StoreOptions, StoreStatus,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::handle::StoreHandle;
use super::shared::{EnvelopeHandler, StateValue, StoreCore};

const FOLLOWER_INITIAL_VERSION: u64 = 0;

/// Handshake and leader tracking.
struct SyncState<S> {
    status: StoreStatus,
    /// When the current handshake attempt started.
    syncing_since: Instant,
    /// The leader whose versions we are following.
    leader: Option<ActorId>,
    /// Intents issued before the handshake completed, in call order.
    queued: Vec<StateUpdate<S>>,
}

struct FollowerInner<S: StateValue> {
    core: StoreCore<S>,
    handshake_timeout: Duration,
    sync: Mutex<SyncState<S>>,
}

/// Mirrors leader-broadcast state and forwards mutation intents to the leader.
///
/// Local state only changes when a leader event arrives; `set_state` never
/// applies speculatively. Cloning yields another handle to the same instance.
pub struct FollowerStore<S: StateValue> {
    inner: Arc<FollowerInner<S>>,
}

impl<S: StateValue> Clone for FollowerStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: StateValue> FollowerStore<S> {
    pub(crate) fn new(
        options: StoreOptions<S>,
        channel: Arc<dyn Channel>,
        environment: Environment,
    ) -> Result<Self> {
        let handshake_timeout = options
            .handshake_timeout
            .unwrap_or_else(|| environment.handshake_timeout());

        let inner = Arc::new(FollowerInner {
            core: StoreCore::new(
                options.store_key,
                options.initial_state,
                FOLLOWER_INITIAL_VERSION,
                Role::Follower,
                environment,
                channel,
            ),
            handshake_timeout,
            sync: Mutex::new(SyncState {
                status: StoreStatus::Syncing,
                syncing_since: Instant::now(),
                leader: None,
                queued: Vec::new(),
            }),
        });
        StoreCore::attach(&inner, &inner.core);

        inner.core.broadcast(ProtocolEvent::ExistingStateRequest)?;
        tracing::debug!(
            store_key = %inner.core.store_key(),
            actor = %inner.core.actor().id,
            %environment,
            timeout_ms = handshake_timeout.as_millis() as u64,
            "follower created, requesting existing state"
        );

        Ok(Self { inner })
    }

    /// Version of the last leader state applied (0 before the handshake).
    pub fn version(&self) -> u64 {
        self.inner.core.version()
    }

    /// The leader this follower is synchronized with, if any.
    pub fn leader(&self) -> Option<ActorId> {
        self.inner.sync.lock().leader
    }

    /// Number of intents waiting for the handshake.
    pub fn queued_intents(&self) -> usize {
        self.inner.sync.lock().queued.len()
    }
}

impl<S: StateValue> FollowerInner<S> {
    /// Current status, failing the handshake once its deadline passed.
    fn status(&self) -> StoreStatus {
        let mut sync = self.sync.lock();
        if sync.status == StoreStatus::Syncing
            && sync.syncing_since.elapsed() >= self.handshake_timeout
        {
            sync.status = StoreStatus::Error;
            let dropped = std::mem::take(&mut sync.queued);
            tracing::warn!(
                store_key = %self.core.store_key(),
                environment = %self.core.actor().environment,
                dropped_intents = dropped.len(),
                "no leader answered the handshake in time"
            );
        }
        sync.status
    }

    fn forward(&self, update: StateUpdate<S>) -> Result<()> {
        let intent = update.apply(&self.core.get_state());
        self.send_intent(&intent)
    }

    fn send_intent(&self, intent: &S) -> Result<()> {
        self.core.broadcast(ProtocolEvent::SetStateRequest {
            state: StoreCore::encode_state(intent)?,
        })
    }

    /// Replay queued intents in call order, each against the previous result.
    fn replay(&self, base: S, queued: Vec<StateUpdate<S>>) -> Result<()> {
        let mut intent = base;
        for update in queued {
            intent = update.apply(&intent);
            self.send_intent(&intent)?;
        }
        Ok(())
    }

    /// Apply a leader state if it is newer than ours.
    ///
    /// A different leader than the one we follow resets the version line.
    fn adopt(&self, leader: ActorInfo, state: serde_json::Value, version: u64) -> Result<()> {
        let store_key = self.core.store_key();
        let state = self.core.decode_state(state)?;

        let (previous, became_ready, queued) = {
            let mut sync = self.sync.lock();
            let same_leader = sync.leader == Some(leader.id);
            if same_leader && version <= self.core.version() {
                tracing::trace!(store_key, version, "ignoring stale leader state");
                return Ok(());
            }
            if !same_leader && sync.leader.is_some() {
                tracing::warn!(store_key, leader = %leader.id, "following a new leader");
            }

            sync.leader = Some(leader.id);
            let became_ready = sync.status != StoreStatus::Ready;
            sync.status = StoreStatus::Ready;
            let queued = std::mem::take(&mut sync.queued);

            // Assign under the sync lock so concurrent deliveries can't interleave.
            let previous = self.core.replace(state.clone(), version);
            (previous, became_ready, queued)
        };

        self.core.notify_state(&state, &previous);

        if became_ready {
            tracing::debug!(store_key, leader = %leader.id, version, "synchronized with leader");
            self.core.broadcast(ProtocolEvent::FollowerCreated)?;
        }
        self.replay(state, queued)
    }

    /// A leader appeared while we had none; ask it for the state.
    fn restart_handshake(&self) -> Result<()> {
        {
            let mut sync = self.sync.lock();
            if sync.status == StoreStatus::Ready {
                return Ok(());
            }
            sync.status = StoreStatus::Syncing;
            sync.syncing_since = Instant::now();
        }
        self.core.broadcast(ProtocolEvent::ExistingStateRequest)
    }
}

impl<S: StateValue> EnvelopeHandler for FollowerInner<S> {
    fn core_actor(&self) -> ActorId {
        self.core.actor().id
    }

    fn handle(&self, envelope: Envelope) {
        let store_key = self.core.store_key();
        let result = match envelope.event {
            ProtocolEvent::ExistingStateResponse { state, version }
            | ProtocolEvent::StateUpdate { state, version, .. } => {
                self.adopt(envelope.actor, state, version)
            }
            ProtocolEvent::LeaderCreated => self.restart_handshake(),
            ProtocolEvent::Custom(event) => {
                self.core
                    .notify_event(&event, &EventInfo { actor: envelope.actor });
                Ok(())
            }
            // Addressed to the leader.
            ProtocolEvent::ExistingStateRequest
            | ProtocolEvent::SetStateRequest { .. }
            | ProtocolEvent::FollowerCreated => Ok(()),
        };

        if let Err(e) = result {
            tracing::warn!(store_key, error = %e, "failed to handle store event");
        }
    }
}

impl<S: StateValue> StoreHandle<S> for FollowerStore<S> {
    fn store_key(&self) -> &str {
        self.inner.core.store_key()
    }

    fn actor(&self) -> ActorInfo {
        self.inner.core.actor()
    }

    fn status(&self) -> StoreStatus {
        self.inner.status()
    }

    fn get_state(&self) -> S {
        self.inner.core.get_state()
    }

    fn set_state(&self, update: impl Into<StateUpdate<S>>) -> Result<SetStateOutcome> {
        let update = update.into();
        match self.inner.status() {
            StoreStatus::Ready => {
                self.inner.forward(update)?;
                Ok(SetStateOutcome::Forwarded)
            }
            StoreStatus::Syncing => {
                let mut sync = self.inner.sync.lock();
                // The handshake may have completed since the status check.
                if sync.status == StoreStatus::Ready {
                    drop(sync);
                    self.inner.forward(update)?;
                    return Ok(SetStateOutcome::Forwarded);
                }
                sync.queued.push(update);
                Ok(SetStateOutcome::Queued)
            }
            StoreStatus::Error => Err(StoreError::LeaderUnavailable {
                store_key: self.inner.core.store_key().to_string(),
            }),
        }
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
