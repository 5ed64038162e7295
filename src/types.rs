//! Core types for the universal store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Default time a follower waits for a leader to answer its handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(1000);

/// The kind of runtime context a store instance lives in.
///
/// Used for diagnostics only, never for authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Environment {
    /// A long-lived server process.
    Server,
    /// The host UI.
    Manager,
    /// An embedded, rendered sub-context.
    Preview,
    /// An isolated test or story context.
    Mock,
    Unknown,
}

impl Environment {
    /// How long a follower in this environment waits for a leader.
    pub fn handshake_timeout(self) -> Duration {
        match self {
            Environment::Mock => Duration::ZERO,
            Environment::Server => Duration::from_millis(500),
            Environment::Manager | Environment::Preview | Environment::Unknown => {
                DEFAULT_HANDSHAKE_TIMEOUT
            }
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Server => "server",
            Environment::Manager => "manager",
            Environment::Preview => "preview",
            Environment::Mock => "mock",
            Environment::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Unique identity of one store instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub Uuid);

impl ActorId {
    pub fn random() -> Self {
        ActorId(Uuid::new_v4())
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId({})", self.0)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Leadership role of an instance. Fixed for its lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Leader,
    Follower,
}

/// Who sent an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorInfo {
    pub id: ActorId,
    pub role: Role,
    pub environment: Environment,
}

/// Synchronization status of an instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreStatus {
    /// Follower waiting for the leader's existing state.
    Syncing,
    /// In sync (leaders are always ready).
    Ready,
    /// No leader answered the handshake in time.
    Error,
}

/// Application-defined event relayed to every instance of a store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomEvent {
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl CustomEvent {
    /// Event without a payload.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: None,
        }
    }

    /// Event carrying a JSON payload.
    pub fn with_payload(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload: Some(payload),
        }
    }
}

/// Delivery metadata passed to custom event listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventInfo {
    pub actor: ActorInfo,
}

/// Options accepted by the store factory.
#[derive(Clone, Debug)]
pub struct StoreOptions<S> {
    /// Identifier shared by every instance of one logical store.
    pub store_key: String,

    /// Used until a leader hands over its state (followers) or as the
    /// canonical starting value (leaders).
    pub initial_state: S,

    /// Construct as leader.
    pub leader: bool,

    /// Overrides the environment's handshake timeout.
    pub handshake_timeout: Option<Duration>,
}

impl<S> StoreOptions<S> {
    pub fn new(store_key: impl Into<String>, initial_state: S) -> Self {
        Self {
            store_key: store_key.into(),
            initial_state,
            leader: false,
            handshake_timeout: None,
        }
    }

    pub fn leader(mut self, leader: bool) -> Self {
        self.leader = leader;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }
}

/// A requested state change: a replacement value or an updater function.
///
/// Updaters must be pure functions of the previous state.
pub enum StateUpdate<S> {
    Value(S),
    With(Box<dyn FnOnce(&S) -> S + Send>),
}

impl<S> StateUpdate<S> {
    /// Wrap an updater closure.
    pub fn with<F>(f: F) -> Self
    where
        F: FnOnce(&S) -> S + Send + 'static,
    {
        StateUpdate::With(Box::new(f))
    }

    pub(crate) fn apply(self, previous: &S) -> S {
        match self {
            StateUpdate::Value(state) => state,
            StateUpdate::With(f) => f(previous),
        }
    }
}

impl<S> From<S> for StateUpdate<S> {
    fn from(state: S) -> Self {
        StateUpdate::Value(state)
    }
}

impl<S: fmt::Debug> fmt::Debug for StateUpdate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateUpdate::Value(state) => f.debug_tuple("Value").field(state).finish(),
            StateUpdate::With(_) => f.write_str("With(<fn>)"),
        }
    }
}

/// What happened to a `set_state` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetStateOutcome {
    /// Applied locally and broadcast (leader).
    Applied,
    /// Sent to the leader; the change shows up once the leader broadcasts it.
    Forwarded,
    /// Held until the handshake completes, then forwarded.
    Queued,
}
