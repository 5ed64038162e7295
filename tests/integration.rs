//! Integration tests for leader/follower synchronization.

use parking_lot::Mutex;
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use universal_store::protocol::channel_event_name;
use universal_store::{
    ActorId, Channel, ChannelEvent, CustomEvent, Envelope, Environment, LocalChannel,
    ProtocolEvent, SetStateOutcome, StateUpdate, StoreHandle, StoreOptions, StoreStatus,
    UniversalStore,
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Panel {
    open: bool,
    selected: Option<String>,
    count: u32,
}

fn manager(channel: &LocalChannel, key: &str, initial: Panel) -> UniversalStore<Panel> {
    UniversalStore::create(
        StoreOptions::new(key, initial).leader(true),
        channel.clone(),
        Environment::Manager,
    )
    .unwrap()
}

fn preview(channel: &LocalChannel, key: &str) -> UniversalStore<Panel> {
    UniversalStore::create(
        StoreOptions::new(key, Panel::default()),
        channel.clone(),
        Environment::Preview,
    )
    .unwrap()
}

/// Record every envelope that crosses the bus for `key`.
fn tap(channel: &LocalChannel, key: &str) -> Arc<Mutex<Vec<Envelope>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    channel.on(
        &channel_event_name(key),
        Arc::new(move |event: &ChannelEvent| {
            if let Ok(envelope) = Envelope::decode(event) {
                sink.lock().push(envelope);
            }
        }),
    );
    seen
}

// --- Realistic Workflow Tests ---

#[test]
fn test_addon_panel_workflow() {
    let channel = LocalChannel::new();
    let host = manager(
        &channel,
        "addon-panel",
        Panel {
            open: false,
            selected: Some("button--primary".to_string()),
            count: 0,
        },
    );
    let left = preview(&channel, "addon-panel");
    let right = preview(&channel, "addon-panel");
    channel.run_until_idle();

    assert_eq!(left.status(), StoreStatus::Ready);
    assert_eq!(right.get_state().selected.as_deref(), Some("button--primary"));

    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    right.subscribe(move |state: &Panel, previous: &Panel| {
        sink.lock().push((previous.open, state.open));
    });

    // A preview toggles the panel; the host decides, everyone follows.
    let outcome = left
        .set_state(StateUpdate::with(|p: &Panel| Panel {
            open: !p.open,
            ..p.clone()
        }))
        .unwrap();
    assert_eq!(outcome, SetStateOutcome::Forwarded);
    assert!(!left.get_state().open);

    channel.run_until_idle();

    assert!(host.get_state().open);
    assert!(left.get_state().open);
    assert!(right.get_state().open);
    assert_eq!(*changes.lock(), vec![(false, true)]);
}

#[test]
fn test_broadcast_reaches_every_follower() {
    let channel = LocalChannel::new();
    let host = manager(&channel, "fanout", Panel::default());
    let followers: Vec<_> = (0..5).map(|_| preview(&channel, "fanout")).collect();
    channel.run_until_idle();

    host.set_state(Panel {
        count: 7,
        ..Panel::default()
    })
    .unwrap();
    channel.run_until_idle();

    for follower in &followers {
        assert_eq!(follower.get_state().count, 7);
        assert_eq!(follower.as_follower().unwrap().version(), 2);
    }
}

#[test]
fn test_follower_sees_leader_states_in_order() {
    let channel = LocalChannel::new();
    let host = manager(&channel, "ordered", Panel::default());
    let follower = preview(&channel, "ordered");
    channel.run_until_idle();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    follower.on_state_change(move |state: &Panel, _: &Panel| sink.lock().push(state.count));

    for _ in 0..20 {
        host.set_state(StateUpdate::with(|p: &Panel| Panel {
            count: p.count + 1,
            ..p.clone()
        }))
        .unwrap();
    }
    channel.run_until_idle();

    assert_eq!(*seen.lock(), (1..=20).collect::<Vec<u32>>());
    assert_eq!(follower.get_state().count, 20);
}

#[test]
fn test_follower_ignores_older_leader_state() {
    let channel = LocalChannel::new();
    let host = manager(&channel, "stale", Panel::default());
    let follower = preview(&channel, "stale");
    channel.run_until_idle();

    for count in 1..=3 {
        host.set_state(Panel {
            count,
            ..Panel::default()
        })
        .unwrap();
    }
    channel.run_until_idle();
    let version = follower.as_follower().unwrap().version();
    assert_eq!(version, 4);

    let notified = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&notified);
    follower.subscribe(move |_, _| *counter.lock() += 1);

    // A late duplicate of an earlier broadcast from the same leader.
    let late = Envelope {
        store_key: "stale".to_string(),
        actor: host.actor(),
        event: ProtocolEvent::StateUpdate {
            state: json!({ "open": true, "selected": "old", "count": 1 }),
            previous_state: json!({ "open": false, "selected": null, "count": 0 }),
            version: 2,
        },
    };
    channel.send(late.encode().unwrap());
    channel.run_until_idle();

    assert_eq!(follower.get_state().count, 3);
    assert!(!follower.get_state().open);
    assert_eq!(follower.as_follower().unwrap().version(), version);
    assert_eq!(*notified.lock(), 0);
}

#[test]
fn test_listener_may_write_back_into_leader() {
    let channel = LocalChannel::new();
    let host = manager(&channel, "reentrant", Panel::default());

    let writer = host.clone();
    host.subscribe(move |state: &Panel, _: &Panel| {
        if state.count < 3 {
            let next = Panel {
                count: state.count + 1,
                ..state.clone()
            };
            writer.set_state(next).unwrap();
        }
    });

    host.set_state(Panel {
        count: 1,
        ..Panel::default()
    })
    .unwrap();
    assert_eq!(host.get_state().count, 3);
}

#[test]
fn test_stores_with_different_keys_are_independent() {
    let channel = LocalChannel::new();
    let a = manager(&channel, "a", Panel::default());
    let _b = manager(&channel, "b", Panel::default());
    let follower_b = preview(&channel, "b");
    channel.run_until_idle();

    a.set_state(Panel {
        count: 99,
        ..Panel::default()
    })
    .unwrap();
    channel.run_until_idle();

    assert_eq!(follower_b.get_state().count, 0);
    assert_eq!(a.as_leader().unwrap().rival_leaders(), 0);
}

// --- Custom Events ---

#[test]
fn test_custom_event_delivered_once_locally() {
    let channel = LocalChannel::new();
    let host = manager(&channel, "events", Panel::default());
    let sender = preview(&channel, "events");
    channel.run_until_idle();

    let local = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&local);
    sender.on_event(Some("story-selected"), move |_, _| *counter.lock() += 1);

    let remote = Arc::new(Mutex::new(Vec::<(CustomEvent, ActorId)>::new()));
    let sink = Arc::clone(&remote);
    host.on_event(Some("story-selected"), move |event, info| {
        sink.lock().push((event.clone(), info.actor.id));
    });

    let unrelated = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&unrelated);
    host.on_event(Some("other"), move |_, _| *counter.lock() += 1);

    let everything = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&everything);
    host.on_event(None, move |_, _| *counter.lock() += 1);

    let event = CustomEvent::with_payload("story-selected", json!({ "id": "button--primary" }));
    sender.send(event.clone()).unwrap();

    // Local delivery is synchronous.
    assert_eq!(*local.lock(), 1);
    assert!(remote.lock().is_empty());

    channel.run_until_idle();

    assert_eq!(*local.lock(), 1);
    assert_eq!(*remote.lock(), vec![(event, sender.actor().id)]);
    assert_eq!(*unrelated.lock(), 0);
    assert_eq!(*everything.lock(), 1);
}

#[test]
fn test_custom_events_do_not_touch_state() {
    let channel = LocalChannel::new();
    let host = manager(&channel, "events", Panel::default());
    let follower = preview(&channel, "events");
    channel.run_until_idle();

    let changes = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&changes);
    follower.subscribe(move |_: &Panel, _: &Panel| *counter.lock() += 1);

    host.send(CustomEvent::new("ping")).unwrap();
    channel.run_until_idle();

    assert_eq!(*changes.lock(), 0);
    assert_eq!(follower.as_follower().unwrap().version(), 1);
}

// --- Subscriptions ---

#[test]
fn test_unsubscribe_is_idempotent() {
    let channel = LocalChannel::new();
    let host = manager(&channel, "unsub", Panel::default());
    let follower = preview(&channel, "unsub");
    channel.run_until_idle();

    let first = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&first);
    let unsubscribe = follower.subscribe(move |_: &Panel, _: &Panel| *counter.lock() += 1);

    let second = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&second);
    follower.subscribe(move |_: &Panel, _: &Panel| *counter.lock() += 1);

    unsubscribe.call();
    unsubscribe.call();
    unsubscribe.clone().call();

    host.set_state(Panel {
        open: true,
        ..Panel::default()
    })
    .unwrap();
    channel.run_until_idle();

    assert_eq!(*first.lock(), 0);
    assert_eq!(*second.lock(), 1);
}

// --- Leadership ---

#[test]
fn test_only_the_leader_emits_state_updates() {
    let channel = LocalChannel::new();
    let wire = tap(&channel, "exclusive");
    let host = manager(&channel, "exclusive", Panel::default());
    let followers: Vec<_> = (0..3).map(|_| preview(&channel, "exclusive")).collect();
    channel.run_until_idle();

    for (i, follower) in followers.iter().enumerate() {
        follower
            .set_state(Panel {
                count: i as u32 + 1,
                ..Panel::default()
            })
            .unwrap();
    }
    host.set_state(StateUpdate::with(|p: &Panel| Panel {
        open: true,
        ..p.clone()
    }))
    .unwrap();
    channel.run_until_idle();

    let wire = wire.lock();
    let updates: Vec<&Envelope> = wire
        .iter()
        .filter(|e| matches!(e.event, ProtocolEvent::StateUpdate { .. }))
        .collect();
    assert_eq!(updates.len(), 4);
    assert!(updates.iter().all(|e| e.actor.id == host.actor().id));

    let requests = wire
        .iter()
        .filter(|e| matches!(e.event, ProtocolEvent::SetStateRequest { .. }))
        .count();
    assert_eq!(requests, 3);
}

// --- Properties ---

fn panel_strategy() -> impl Strategy<Value = Panel> {
    (any::<bool>(), proptest::option::of("[a-z]{1,12}"), any::<u32>()).prop_map(
        |(open, selected, count)| Panel {
            open,
            selected,
            count,
        },
    )
}

proptest! {
    /// Whatever the leader sets, every follower holds after one turn.
    #[test]
    fn prop_leader_round_trip(
        states in proptest::collection::vec(panel_strategy(), 1..16),
        follower_count in 1usize..4,
    ) {
        let channel = LocalChannel::new();
        let host = manager(&channel, "prop", Panel::default());
        let followers: Vec<_> = (0..follower_count).map(|_| preview(&channel, "prop")).collect();
        channel.run_until_idle();

        for state in states {
            host.set_state(state.clone()).unwrap();
            channel.process_pending();
            for follower in &followers {
                prop_assert_eq!(follower.get_state(), state.clone());
            }
        }
    }
}
