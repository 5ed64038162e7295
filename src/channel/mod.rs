//! Message transport connecting store instances.
//!
//! The store consumes a [`Channel`] as an opaque duplex primitive: it sends
//! named events and registers handlers per event name. Implementations only
//! need to keep per-sender order; nothing else about delivery is assumed.
//!
//! [`LocalChannel`] is the in-process implementation. Clones share one bus,
//! so independently created instances (host, previews) can be wired together
//! in a single process, while `LocalChannel::new()` gives a private bus.
//!
//! # Example
//!
//! ```ignore
//! let channel = LocalChannel::new();
//! let id = channel.on("greeting", Arc::new(|event: &ChannelEvent| {
//!     println!("got {}", event.payload);
//! }));
//!
//! channel.send(ChannelEvent::new("greeting", json!("hello")));
//! channel.run_until_idle();
//! channel.off("greeting", id);
//! ```

mod local;

pub use local::LocalChannel;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A named event carried by a channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub name: String,
    pub payload: serde_json::Value,
}

impl ChannelEvent {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Identifier of a registered channel handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u64);

/// Callback invoked for every delivered event of the registered name.
pub type EventHandler = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

/// Duplex message transport.
pub trait Channel: Send + Sync {
    /// Send an event. Must not invoke handlers synchronously.
    fn send(&self, event: ChannelEvent);

    /// Register a handler for an event name.
    fn on(&self, name: &str, handler: EventHandler) -> HandlerId;

    /// Remove a handler. Unknown ids are ignored.
    fn off(&self, name: &str, id: HandlerId);
}
