//! # Universal Store
//!
//! A single logical piece of state kept in sync between independent
//! execution contexts that only talk through an asynchronous channel.
//!
//! ## Core Concepts
//!
//! - **Leader**: the one instance per store key that applies mutations and
//!   broadcasts each new state
//! - **Followers**: mirror the leader's state and forward their own
//!   mutation intents to it; they never apply a write speculatively
//! - **Custom events**: application messages relayed to every instance
//!   through the same channel, independent of the state
//! - **Mock stores**: private-channel leaders with optional call recording
//!
//! ## Example
//!
//! ```ignore
//! use universal_store::{Environment, LocalChannel, StoreHandle, StoreOptions, UniversalStore};
//!
//! let channel = LocalChannel::new();
//! let manager = UniversalStore::create(
//!     StoreOptions::new("theme", "light".to_string()).leader(true),
//!     channel.clone(),
//!     Environment::Manager,
//! )?;
//! let preview = UniversalStore::create(
//!     StoreOptions::new("theme", String::new()),
//!     channel.clone(),
//!     Environment::Preview,
//! )?;
//!
//! preview.subscribe(|theme, _previous| println!("theme is now {theme}"));
//! manager.set_state("dark".to_string())?;
//!
//! // Deliver pending channel events.
//! channel.run_until_idle();
//! assert_eq!(preview.get_state(), "dark");
//! ```

pub mod channel;
pub mod error;
pub mod mock;
pub mod protocol;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use channel::{Channel, ChannelEvent, EventHandler, HandlerId, LocalChannel};
pub use error::{Result, StoreError};
pub use mock::{MockUniversalStore, Recorded, RecordedUpdate, StoreCall, StoreMethod};
pub use protocol::{Envelope, ProtocolEvent};
pub use store::{FollowerStore, LeaderStore, StateValue, StoreHandle, UniversalStore};
pub use subscriptions::{ListenerId, Unsubscribe};
pub use types::*;
