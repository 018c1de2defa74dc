//! Contract test: incoming-transfer watch
//!
//! Constraints verified:
//! - A failed own-account lookup is retried on a later cycle instead of
//!   permanently disabling the job
//! - The first successful poll seeds the transfer snapshot silently
//! - Subsequent transfers fire exactly once, keyed by their opaque id

mod common;

use common::*;
use std::sync::atomic::Ordering;

use boardwatch_core::{Event, Watcher, WatcherConfig};

#[tokio::test]
async fn unresolved_account_is_retried_then_watch_proceeds() {
    let client = ScriptedClient::new();
    let notifier = RecordingNotifier::new();
    let now = now_epoch();

    // First lookup fails to resolve; the retry succeeds.
    client.script_whoami(vec![None]);
    client.set_whoami(Some(5));
    client.set_transfers(vec![transfer("tx-1", 10.0, now - 100)]);

    let watcher = Watcher::new(client.clone(), notifier.clone(), WatcherConfig::default())
        .expect("watcher construction succeeds")
        .watch_bytes(Some(TICK));
    let handle = watcher.handle();
    let run = tokio::spawn(watcher.start());

    settle().await;
    assert!(
        client.whoami_calls.load(Ordering::SeqCst) >= 2,
        "unresolved account must be retried"
    );
    // Seed poll recorded tx-1 without notifying.
    assert!(notifier.events().is_empty());

    client.push_transfer(transfer("tx-2", 25.5, now));
    settle().await;

    handle.stop();
    run.await.unwrap().unwrap();

    let events = notifier.events();
    assert_eq!(events.len(), 1, "got {events:?}");
    match &events[0] {
        Event::BytesReceived { id, amount, .. } => {
            assert_eq!(id, "tx-2");
            assert_eq!(*amount, 25.5);
        }
        other => panic!("expected bytes_received, got {other:?}"),
    }
}

#[tokio::test]
async fn resolved_account_is_cached_across_cycles() {
    let client = ScriptedClient::new();
    let notifier = RecordingNotifier::new();

    client.set_whoami(Some(5));
    client.set_transfers(vec![]);

    let watcher = Watcher::new(client.clone(), notifier.clone(), WatcherConfig::default())
        .expect("watcher construction succeeds")
        .watch_bytes(Some(TICK));
    let handle = watcher.handle();
    let run = tokio::spawn(watcher.start());

    settle().await;
    handle.stop();
    run.await.unwrap().unwrap();

    assert_eq!(
        client.whoami_calls.load(Ordering::SeqCst),
        1,
        "own id resolves once, then sticks"
    );
    assert!(client.transfer_calls.load(Ordering::SeqCst) >= 2);
}
