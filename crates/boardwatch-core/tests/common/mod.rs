//! Test doubles and common utilities for watcher contract tests
//!
//! The scripted client holds mutable per-endpoint fixtures that a test can
//! change between polls, plus call counters so tests can assert which
//! endpoints were actually hit.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use boardwatch_core::error::{Error, Result};
use boardwatch_core::model::{Event, Post, ThreadMeta, ThreadSummary, Transfer, WatchKind};
use boardwatch_core::traits::{BoardClient, DedupStore, ErrorSink, Notifier};

#[derive(Default)]
struct Fixtures {
    thread_meta: HashMap<u64, ThreadMeta>,
    thread_posts: HashMap<u64, Vec<Post>>,
    forum_threads: HashMap<u64, Vec<ThreadSummary>>,
    user_threads: HashMap<u64, Vec<ThreadSummary>>,
    user_posts: HashMap<u64, Vec<Post>>,
    whoami_script: Vec<Option<u64>>,
    whoami: Option<u64>,
    transfers: Vec<Transfer>,
}

/// A BoardClient over mutable in-memory fixtures
#[derive(Default)]
pub struct ScriptedClient {
    fixtures: Mutex<Fixtures>,
    /// When set, forum_threads for this fid fails with a client error
    failing_fid: Mutex<Option<u64>>,
    /// When set, every forum_threads call fails with a rate-limit error
    rate_limited: AtomicBool,
    pub forum_calls: AtomicUsize,
    pub thread_posts_calls: AtomicUsize,
    pub whoami_calls: AtomicUsize,
    pub transfer_calls: AtomicUsize,
    /// Thread ids whose posts were fetched
    posts_fetched_for: Mutex<Vec<u64>>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_thread_meta(&self, meta: ThreadMeta) {
        let mut f = self.fixtures.lock().unwrap();
        f.thread_meta.insert(meta.tid, meta);
    }

    pub fn set_thread_posts(&self, tid: u64, posts: Vec<Post>) {
        self.fixtures.lock().unwrap().thread_posts.insert(tid, posts);
    }

    pub fn set_forum_threads(&self, fid: u64, threads: Vec<ThreadSummary>) {
        self.fixtures.lock().unwrap().forum_threads.insert(fid, threads);
    }

    pub fn push_forum_thread(&self, fid: u64, thread: ThreadSummary) {
        self.fixtures
            .lock()
            .unwrap()
            .forum_threads
            .entry(fid)
            .or_default()
            .push(thread);
    }

    pub fn set_user_threads(&self, uid: u64, threads: Vec<ThreadSummary>) {
        self.fixtures.lock().unwrap().user_threads.insert(uid, threads);
    }

    pub fn set_user_posts(&self, uid: u64, posts: Vec<Post>) {
        self.fixtures.lock().unwrap().user_posts.insert(uid, posts);
    }

    /// Queue one-shot whoami responses, consumed in order; afterwards the
    /// value set with [`set_whoami`](Self::set_whoami) is returned.
    pub fn script_whoami(&self, responses: Vec<Option<u64>>) {
        self.fixtures.lock().unwrap().whoami_script = responses;
    }

    pub fn set_whoami(&self, uid: Option<u64>) {
        self.fixtures.lock().unwrap().whoami = uid;
    }

    pub fn set_transfers(&self, transfers: Vec<Transfer>) {
        self.fixtures.lock().unwrap().transfers = transfers;
    }

    pub fn push_transfer(&self, transfer: Transfer) {
        self.fixtures.lock().unwrap().transfers.push(transfer);
    }

    pub fn fail_forum(&self, fid: u64) {
        *self.failing_fid.lock().unwrap() = Some(fid);
    }

    pub fn set_rate_limited(&self, limited: bool) {
        self.rate_limited.store(limited, Ordering::SeqCst);
    }

    pub fn posts_fetched_for(&self) -> Vec<u64> {
        self.posts_fetched_for.lock().unwrap().clone()
    }
}

#[async_trait]
impl BoardClient for ScriptedClient {
    async fn thread_meta(&self, tid: u64) -> Result<Option<ThreadMeta>> {
        Ok(self.fixtures.lock().unwrap().thread_meta.get(&tid).cloned())
    }

    async fn thread_posts(&self, tid: u64, page: u32, per_page: u32) -> Result<Vec<Post>> {
        self.thread_posts_calls.fetch_add(1, Ordering::SeqCst);
        self.posts_fetched_for.lock().unwrap().push(tid);
        let posts = self
            .fixtures
            .lock()
            .unwrap()
            .thread_posts
            .get(&tid)
            .cloned()
            .unwrap_or_default();
        let start = ((page.max(1) - 1) * per_page) as usize;
        Ok(posts
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect())
    }

    async fn forum_threads(&self, fid: u64) -> Result<Vec<ThreadSummary>> {
        self.forum_calls.fetch_add(1, Ordering::SeqCst);
        if self.rate_limited.load(Ordering::SeqCst) {
            return Err(Error::rate_limited("too many requests"));
        }
        if *self.failing_fid.lock().unwrap() == Some(fid) {
            return Err(Error::client("scripted failure"));
        }
        Ok(self
            .fixtures
            .lock()
            .unwrap()
            .forum_threads
            .get(&fid)
            .cloned()
            .unwrap_or_default())
    }

    async fn user_threads(&self, uid: u64, _page: u32, _per_page: u32) -> Result<Vec<ThreadSummary>> {
        Ok(self
            .fixtures
            .lock()
            .unwrap()
            .user_threads
            .get(&uid)
            .cloned()
            .unwrap_or_default())
    }

    async fn user_posts(&self, uid: u64, _page: u32, _per_page: u32) -> Result<Vec<Post>> {
        Ok(self
            .fixtures
            .lock()
            .unwrap()
            .user_posts
            .get(&uid)
            .cloned()
            .unwrap_or_default())
    }

    async fn whoami(&self) -> Result<Option<u64>> {
        self.whoami_calls.fetch_add(1, Ordering::SeqCst);
        let mut f = self.fixtures.lock().unwrap();
        if f.whoami_script.is_empty() {
            Ok(f.whoami)
        } else {
            Ok(f.whoami_script.remove(0))
        }
    }

    async fn incoming_transfers(&self, _uid: u64, _per_page: u32) -> Result<Vec<Transfer>> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.fixtures.lock().unwrap().transfers.clone())
    }
}

/// A DedupStore whose check-and-insert always fails, simulating a
/// persistence outage. Seeding and reads keep working so a watch can get
/// past cold start before hitting the fault.
#[derive(Default)]
pub struct FailingDedupStore {
    pub add_if_new_calls: AtomicUsize,
}

impl FailingDedupStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl DedupStore for FailingDedupStore {
    async fn has(&self, _namespace: &str, _key: &str, _event_id: &str) -> Result<bool> {
        Ok(false)
    }

    async fn add(&self, _namespace: &str, _key: &str, _event_id: &str) -> Result<()> {
        Ok(())
    }

    async fn add_if_new(&self, _namespace: &str, _key: &str, _event_id: &str) -> Result<bool> {
        self.add_if_new_calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::store("dedup store offline"))
    }

    async fn filter_new(
        &self,
        _namespace: &str,
        _key: &str,
        event_ids: &[String],
    ) -> Result<Vec<String>> {
        Ok(event_ids.to_vec())
    }

    async fn add_many(&self, _namespace: &str, _key: &str, event_ids: &[String]) -> Result<usize> {
        Ok(event_ids.len())
    }

    async fn prune(&self, _namespace: &str, _key: &str, _keep: usize) -> Result<usize> {
        Ok(0)
    }

    async fn purge_older_than(&self, _age: Duration) -> Result<usize> {
        Ok(0)
    }

    async fn stats(&self) -> Result<HashMap<String, u64>> {
        Ok(HashMap::new())
    }

    async fn clear(&self, _namespace: Option<&str>, _key: Option<&str>) -> Result<usize> {
        Ok(0)
    }
}

/// A Notifier that records every delivered event
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Event>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_of_kind(&self, kind: WatchKind) -> Vec<Event> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: Event) -> Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// An ErrorSink that records every forwarded error
#[derive(Default)]
pub struct RecordingErrorSink {
    errors: Mutex<Vec<(WatchKind, String)>>,
}

impl RecordingErrorSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn errors(&self) -> Vec<(WatchKind, String)> {
        self.errors.lock().unwrap().clone()
    }
}

#[async_trait]
impl ErrorSink for RecordingErrorSink {
    async fn on_error(&self, kind: WatchKind, error: &Error) {
        self.errors.lock().unwrap().push((kind, error.to_string()));
    }
}

pub fn thread_summary(tid: u64, uid: u64, subject: &str, dateline: u64) -> ThreadSummary {
    ThreadSummary {
        tid,
        uid,
        subject: subject.to_string(),
        dateline,
    }
}

pub fn post(pid: u64, tid: u64, uid: u64, message: &str, dateline: u64) -> Post {
    Post {
        pid,
        tid,
        uid,
        subject: format!("RE: thread {tid}"),
        message: message.to_string(),
        dateline,
    }
}

pub fn transfer(id: &str, amount: f64, dateline: u64) -> Transfer {
    Transfer {
        id: id.to_string(),
        from_user: "sender".to_string(),
        amount,
        reason: "payment".to_string(),
        dateline,
    }
}

pub fn now_epoch() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// A short polling interval for tests
pub const TICK: Duration = Duration::from_millis(20);

/// Long enough for several polls at [`TICK`]
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(90)).await;
}
