//! Wire envelope exchanged between store instances.
//!
//! Every instance of a store listens on one channel event name derived from
//! its store key. Control events and custom events share that name but are
//! distinct variants, so an application event type can never be mistaken for
//! a control event.

use crate::channel::ChannelEvent;
use crate::error::{Result, StoreError};
use crate::types::{ActorInfo, CustomEvent};
use serde::{Deserialize, Serialize};

/// Prefix of the channel event name used by every store.
pub const CHANNEL_EVENT_PREFIX: &str = "UNIVERSAL_STORE:";

/// Channel event name for a store key.
pub fn channel_event_name(store_key: &str) -> String {
    format!("{CHANNEL_EVENT_PREFIX}{store_key}")
}

/// Events of the synchronization protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolEvent {
    /// A follower asks the leader for the canonical state.
    ExistingStateRequest,
    /// The leader's answer to a handshake.
    ExistingStateResponse {
        state: serde_json::Value,
        version: u64,
    },
    /// A leader came online.
    LeaderCreated,
    /// A follower finished its handshake.
    FollowerCreated,
    /// A follower's mutation intent. Only the leader acts on it.
    SetStateRequest { state: serde_json::Value },
    /// The leader applied a new state. Only leaders emit this.
    StateUpdate {
        state: serde_json::Value,
        previous_state: serde_json::Value,
        version: u64,
    },
    /// Application event relayed to every instance.
    Custom(CustomEvent),
}

impl ProtocolEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolEvent::ExistingStateRequest => "EXISTING_STATE_REQUEST",
            ProtocolEvent::ExistingStateResponse { .. } => "EXISTING_STATE_RESPONSE",
            ProtocolEvent::LeaderCreated => "LEADER_CREATED",
            ProtocolEvent::FollowerCreated => "FOLLOWER_CREATED",
            ProtocolEvent::SetStateRequest { .. } => "SET_STATE_REQUEST",
            ProtocolEvent::StateUpdate { .. } => "STATE_UPDATE",
            ProtocolEvent::Custom(_) => "CUSTOM",
        }
    }
}

/// A protocol event plus routing metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub store_key: String,
    pub actor: ActorInfo,
    pub event: ProtocolEvent,
}

impl Envelope {
    pub fn encode(&self) -> Result<ChannelEvent> {
        let payload = serde_json::to_value(self).map_err(StoreError::encode)?;
        Ok(ChannelEvent::new(channel_event_name(&self.store_key), payload))
    }

    pub fn decode(event: &ChannelEvent) -> Result<Self> {
        let envelope: Envelope =
            serde_json::from_value(event.payload.clone()).map_err(StoreError::decode)?;

        if channel_event_name(&envelope.store_key) != event.name {
            return Err(StoreError::Deserialization(format!(
                "envelope for store {} arrived on {}",
                envelope.store_key, event.name
            )));
        }

        Ok(envelope)
    }
}
