//! Listener registries for state changes and custom events.
//!
//! Every subscription returns an [`Unsubscribe`] handle:
//! - Calling it more than once is a no-op
//! - Calling it after the store is dropped is a no-op
//! - Clones share identity, so recording layers can hand back the same handle
//!
//! Dispatch runs listeners in registration order, outside of any lock, and
//! isolates panics so one bad listener can't starve the others.
//!
//! # Example
//!
//! ```ignore
//! let unsubscribe = store.subscribe(|state, previous| {
//!     println!("{previous:?} -> {state:?}");
//! });
//!
//! // later
//! unsubscribe.call();
//! unsubscribe.call(); // no-op
//! ```

mod registry;
mod types;

pub use registry::ListenerRegistry;
pub use types::{EventListener, ListenerId, StateListener, Unsubscribe};
