//! Contract test: thread reply detection
//!
//! Constraints verified:
//! - The first observation baselines the lastpost timestamp silently
//! - An advanced timestamp fires one event per reply newer than the
//!   baseline, oldest first
//! - When the reply fetch resolves nothing, a fallback event is synthesized
//!   so the change is not silently dropped

mod common;

use common::*;

use boardwatch_core::model::ThreadMeta;
use boardwatch_core::{Event, Watcher, WatcherConfig};

fn meta(tid: u64, last_post: u64, num_replies: u64) -> ThreadMeta {
    ThreadMeta {
        tid,
        subject: "watched thread".to_string(),
        last_post,
        num_replies,
    }
}

#[tokio::test]
async fn baseline_then_new_replies_fire_oldest_first() {
    let client = ScriptedClient::new();
    let notifier = RecordingNotifier::new();

    client.set_thread_meta(meta(88, 1000, 3));
    client.set_thread_posts(
        88,
        vec![
            post(101, 88, 2, "opening post", 500),
            post(102, 88, 3, "old reply", 800),
            post(103, 88, 4, "old reply", 1000),
        ],
    );

    let watcher = Watcher::new(client.clone(), notifier.clone(), WatcherConfig::default())
        .expect("watcher construction succeeds")
        .watch_thread(88, Some(TICK));
    let handle = watcher.handle();
    let run = tokio::spawn(watcher.start());

    settle().await;
    assert!(notifier.events().is_empty(), "baseline poll must be silent");

    // Two new replies arrive out of order on the page.
    client.set_thread_meta(meta(88, 2000, 5));
    client.set_thread_posts(
        88,
        vec![
            post(101, 88, 2, "opening post", 500),
            post(102, 88, 3, "old reply", 800),
            post(103, 88, 4, "old reply", 1000),
            post(105, 88, 6, "second new reply", 2000),
            post(104, 88, 5, "first new reply", 1500),
        ],
    );
    settle().await;

    handle.stop();
    run.await.unwrap().unwrap();

    let events = notifier.events();
    assert_eq!(events.len(), 2, "got {events:?}");
    assert!(matches!(events[0], Event::ThreadReply { pid: Some(104), .. }));
    assert!(matches!(events[1], Event::ThreadReply { pid: Some(105), .. }));
}

#[tokio::test]
async fn lossy_reply_fetch_synthesizes_fallback_event() {
    let client = ScriptedClient::new();
    let notifier = RecordingNotifier::new();

    client.set_thread_meta(meta(88, 1000, 3));

    let watcher = Watcher::new(client.clone(), notifier.clone(), WatcherConfig::default())
        .expect("watcher construction succeeds")
        .watch_thread(88, Some(TICK));
    let handle = watcher.handle();
    let run = tokio::spawn(watcher.start());

    settle().await;

    // Timestamp advances but the post fetch yields nothing.
    client.set_thread_meta(meta(88, 2000, 4));
    settle().await;

    handle.stop();
    run.await.unwrap().unwrap();

    let events = notifier.events();
    assert_eq!(events.len(), 1, "got {events:?}");
    match &events[0] {
        Event::ThreadReply { tid, pid, uid, dateline, .. } => {
            assert_eq!(*tid, 88);
            assert!(pid.is_none());
            assert!(uid.is_none());
            assert_eq!(*dateline, 2000);
        }
        other => panic!("expected thread_reply, got {other:?}"),
    }
}

#[tokio::test]
async fn vanished_thread_is_skipped_without_error() {
    let client = ScriptedClient::new();
    let notifier = RecordingNotifier::new();
    let sink = RecordingErrorSink::new();

    let watcher = Watcher::new(client, notifier.clone(), WatcherConfig::default())
        .expect("watcher construction succeeds")
        .with_error_sink(sink.clone())
        .watch_thread(404, Some(TICK));
    let handle = watcher.handle();
    let run = tokio::spawn(watcher.start());

    settle().await;
    handle.stop();
    run.await.unwrap().unwrap();

    assert!(notifier.events().is_empty());
    assert!(sink.errors().is_empty(), "a vanished thread is not a fault");
}
