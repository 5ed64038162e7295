//! In-process channel backed by a queue.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{Channel, ChannelEvent, EventHandler, HandlerId};

/// Upper bound on turns in `run_until_idle`, so ping-pong handlers can't spin forever.
const MAX_IDLE_TURNS: usize = 1024;

struct Bus {
    queue_tx: Sender<ChannelEvent>,
    queue_rx: Receiver<ChannelEvent>,
    handlers: RwLock<HashMap<String, Vec<(HandlerId, EventHandler)>>>,
    next_id: AtomicU64,
}

/// Shared in-process bus.
///
/// `send` only enqueues. Events are delivered, in send order, to every
/// handler registered for their name (the sender's own handlers included)
/// when the owner of the bus drives a turn with [`LocalChannel::process_pending`].
#[derive(Clone)]
pub struct LocalChannel {
    bus: Arc<Bus>,
}

impl LocalChannel {
    /// Create a new, private bus.
    pub fn new() -> Self {
        let (queue_tx, queue_rx) = unbounded();
        Self {
            bus: Arc::new(Bus {
                queue_tx,
                queue_rx,
                handlers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Number of events waiting for the next turn.
    pub fn pending(&self) -> usize {
        self.bus.queue_rx.len()
    }

    /// Number of handlers currently registered for a name.
    pub fn handler_count(&self, name: &str) -> usize {
        self.bus.handlers.read().get(name).map_or(0, Vec::len)
    }

    /// Whether two handles share the same bus.
    pub fn same_bus(&self, other: &LocalChannel) -> bool {
        Arc::ptr_eq(&self.bus, &other.bus)
    }

    /// Run one turn: deliver the events queued before this call.
    ///
    /// Events sent by handlers during the turn wait for the next one.
    /// Returns the number of events delivered.
    pub fn process_pending(&self) -> usize {
        let queued = self.bus.queue_rx.len();
        let mut delivered = 0;

        for _ in 0..queued {
            let Ok(event) = self.bus.queue_rx.try_recv() else {
                break;
            };
            self.dispatch(&event);
            delivered += 1;
        }

        delivered
    }

    /// Run turns until the queue is empty. Returns the total delivered.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        for _ in 0..MAX_IDLE_TURNS {
            let delivered = self.process_pending();
            if delivered == 0 {
                return total;
            }
            total += delivered;
        }

        tracing::warn!(
            pending = self.pending(),
            "local channel still busy after {} turns",
            MAX_IDLE_TURNS
        );
        total
    }

    fn dispatch(&self, event: &ChannelEvent) {
        // Snapshot so handlers can register, unregister or send without deadlocking.
        let handlers: Vec<EventHandler> = {
            let map = self.bus.handlers.read();
            match map.get(&event.name) {
                Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => return,
            }
        };

        for handler in handlers {
            handler(event);
        }
    }
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for LocalChannel {
    fn send(&self, event: ChannelEvent) {
        // Both ends live in the bus, so the queue can't be disconnected.
        let _ = self.bus.queue_tx.send(event);
    }

    fn on(&self, name: &str, handler: EventHandler) -> HandlerId {
        let id = HandlerId(self.bus.next_id.fetch_add(1, Ordering::SeqCst));
        self.bus
            .handlers
            .write()
            .entry(name.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    fn off(&self, name: &str, id: HandlerId) {
        let mut map = self.bus.handlers.write();
        if let Some(list) = map.get_mut(name) {
            list.retain(|(existing, _)| *existing != id);
            if list.is_empty() {
                map.remove(name);
            }
        }
    }
}
