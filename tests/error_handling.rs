//! Error handling and edge case tests.

use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use universal_store::protocol::channel_event_name;
use universal_store::{
    Channel, ChannelEvent, CustomEvent, Environment, LocalChannel, StoreError, StoreHandle,
    StoreOptions, StoreStatus, UniversalStore,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn leader(channel: &LocalChannel, key: &str, initial: u32) -> UniversalStore<u32> {
    UniversalStore::create(
        StoreOptions::new(key, initial).leader(true),
        channel.clone(),
        Environment::Server,
    )
    .unwrap()
}

fn follower(channel: &LocalChannel, key: &str) -> UniversalStore<u32> {
    UniversalStore::create(
        StoreOptions::new(key, 0u32),
        channel.clone(),
        Environment::Preview,
    )
    .unwrap()
}

// --- Construction ---

#[test]
fn test_empty_store_key() {
    let result = UniversalStore::create(
        StoreOptions::new("", 0u32),
        LocalChannel::new(),
        Environment::Manager,
    );
    assert!(matches!(result, Err(StoreError::InvalidConfig(_))));
}

// --- Listener Failures ---

#[test]
fn test_panicking_state_listener_does_not_block_others() {
    init_tracing();
    let channel = LocalChannel::new();
    let host = leader(&channel, "panics", 0);
    let mirror = follower(&channel, "panics");
    channel.run_until_idle();

    let seen = Arc::new(Mutex::new(Vec::new()));
    for store in [&host, &mirror] {
        store.subscribe(|_, _| panic!("listener bug"));
        let sink = Arc::clone(&seen);
        let role = store.is_leader();
        store.subscribe(move |state, _| sink.lock().push((role, *state)));
    }

    host.set_state(4u32).unwrap();
    channel.run_until_idle();

    assert_eq!(*seen.lock(), vec![(true, 4), (false, 4)]);
    assert_eq!(mirror.get_state(), 4);
}

#[test]
fn test_panicking_event_listener_does_not_block_others() {
    init_tracing();
    let channel = LocalChannel::new();
    let host = leader(&channel, "event-panics", 0);

    let seen = Arc::new(Mutex::new(0));
    host.on_event(None, |_, _| panic!("listener bug"));
    let counter = Arc::clone(&seen);
    host.on_event(None, move |_, _| *counter.lock() += 1);

    host.send(CustomEvent::new("boom")).unwrap();
    assert_eq!(*seen.lock(), 1);
}

// --- Malformed Traffic ---

#[test]
fn test_malformed_envelope_is_dropped() {
    init_tracing();
    let channel = LocalChannel::new();
    let host = leader(&channel, "garbage", 1);
    let mirror = follower(&channel, "garbage");
    channel.run_until_idle();

    channel.send(ChannelEvent::new(
        channel_event_name("garbage"),
        json!({ "not": "an envelope" }),
    ));
    channel.run_until_idle();

    host.set_state(2u32).unwrap();
    channel.run_until_idle();
    assert_eq!(mirror.get_state(), 2);
}

#[test]
fn test_incompatible_state_type_is_rejected() {
    init_tracing();
    let channel = LocalChannel::new();
    let _host = UniversalStore::create(
        StoreOptions::new("typed", "not a number".to_string()).leader(true),
        channel.clone(),
        Environment::Manager,
    )
    .unwrap();
    let mirror = follower(&channel, "typed");
    channel.run_until_idle();

    assert_eq!(mirror.get_state(), 0);
    assert_eq!(mirror.as_follower().unwrap().leader(), None);
}

// --- Missing Leader ---

#[test]
fn test_leader_unavailable_after_handshake_timeout() {
    init_tracing();
    let channel = LocalChannel::new();
    let orphan = UniversalStore::create(
        StoreOptions::new("orphan", 3u32).handshake_timeout(Duration::from_millis(10)),
        channel.clone(),
        Environment::Preview,
    )
    .unwrap();
    channel.run_until_idle();
    std::thread::sleep(Duration::from_millis(20));

    assert_eq!(orphan.status(), StoreStatus::Error);
    let err = orphan.set_state(4u32).unwrap_err();
    assert!(matches!(
        err,
        StoreError::LeaderUnavailable { ref store_key } if store_key == "orphan"
    ));
    assert_eq!(orphan.get_state(), 3);
}

#[test]
fn test_queued_intents_dropped_when_handshake_fails() {
    let channel = LocalChannel::new();
    let orphan = UniversalStore::create(
        StoreOptions::new("orphan", 0u32).handshake_timeout(Duration::from_millis(100)),
        channel.clone(),
        Environment::Preview,
    )
    .unwrap();

    orphan.set_state(1u32).unwrap();
    assert_eq!(orphan.as_follower().unwrap().queued_intents(), 1);

    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(orphan.status(), StoreStatus::Error);
    assert_eq!(orphan.as_follower().unwrap().queued_intents(), 0);
}

// --- Stale Handles ---

#[test]
fn test_unsubscribe_after_store_dropped() {
    let channel = LocalChannel::new();
    let host = leader(&channel, "gone", 0);
    let unsubscribe = host.subscribe(|_, _| {});
    let on_event = host.on_event(Some("x"), |_, _| {});
    drop(host);

    unsubscribe.call();
    unsubscribe.call();
    on_event.call();
    assert!(unsubscribe.is_called());
}

#[test]
fn test_dropped_follower_stops_receiving() {
    let channel = LocalChannel::new();
    let host = leader(&channel, "dropped", 0);
    let mirror = follower(&channel, "dropped");
    channel.run_until_idle();

    let seen = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&seen);
    mirror.subscribe(move |_, _| *counter.lock() += 1);
    drop(mirror);

    host.set_state(1u32).unwrap();
    channel.run_until_idle();
    assert_eq!(*seen.lock(), 0);
    assert_eq!(channel.handler_count(&channel_event_name("dropped")), 1);
}
