//! Watcher supervisor and job loops
//!
//! The [`Watcher`] owns a collection of watch jobs and runs one independent
//! polling task per job. Tasks are peers: there is no ordering between them,
//! and a fault in one iteration is logged, forwarded to the optional
//! [`ErrorSink`], and never allowed to stop the job or touch its siblings.
//!
//! ```text
//! ┌──────────────┐   poll    ┌─────────────┐
//! │ BoardClient  │◄──────────│  job task ×N │
//! └──────────────┘           └──────┬──────┘
//!                      seen-state?  │  new items
//!                   ┌───────────────┼──────────────┐
//!                   ▼               ▼              ▼
//!            ┌────────────┐  ┌────────────┐  ┌──────────┐
//!            │ BoundedSeen│  │ DedupStore │  │ Notifier │
//!            │ (per job)  │  │ (shared)   │  │ (shared) │
//!            └────────────┘  └────────────┘  └──────────┘
//! ```
//!
//! Cancellation is cooperative: [`WatcherHandle::stop`] flips a flag that
//! every task checks between iterations. In-flight fetches complete; they
//! are simply not followed by another iteration.
//!
//! ## Cold start
//!
//! Every diff-based job seeds its seen-state from the first poll's snapshot
//! and emits nothing for it. The seed reads a single unpaginated fetch per
//! job kind, so items beyond that snapshot's first page will fire as "new"
//! on the second poll. That scope limitation is inherited deliberately; a
//! multi-page seed would trade it for a burst of cold-start requests.

mod bytes;
mod forum;
mod keyword;
mod thread;
mod user;

pub use user::UserWatchMode;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::WatcherConfig;
use crate::error::{Error, Result};
use crate::model::WatchKind;
use crate::ratelimit::RateLimitGate;
use crate::traits::{BoardClient, DedupStore, ErrorSink, Notifier};

use bytes::BytesWatch;
use forum::ForumWatch;
use keyword::KeywordWatch;
use thread::ThreadWatch;
use user::UserWatch;

/// Shared collaborators handed to every job's poll.
pub(crate) struct WatchContext {
    pub client: Arc<dyn BoardClient>,
    pub notifier: Arc<dyn Notifier>,
    pub store: Option<Arc<dyn DedupStore>>,
    pub gate: Arc<RateLimitGate>,
    pub config: WatcherConfig,
    pub credential: String,
}

impl WatchContext {
    /// Atomic check-and-insert against the persistent store, when one is
    /// configured. `true` means this id has never produced a notification
    /// in any process lifetime the store covers.
    ///
    /// Store faults propagate: they must not be mistaken for "already seen"
    /// or "nothing new".
    pub(crate) async fn first_sighting(&self, ns: &str, key: &str, id: &str) -> Result<bool> {
        match &self.store {
            Some(store) => store.add_if_new(ns, key, id).await,
            None => Ok(true),
        }
    }

    /// Persistent-store membership check without inserting.
    pub(crate) async fn store_has(&self, ns: &str, key: &str, id: &str) -> Result<bool> {
        match &self.store {
            Some(store) => store.has(ns, key, id).await,
            None => Ok(false),
        }
    }

    /// Mark one id seen in the persistent store.
    pub(crate) async fn store_mark(&self, ns: &str, key: &str, id: &str) -> Result<()> {
        match &self.store {
            Some(store) => store.add(ns, key, id).await,
            None => Ok(()),
        }
    }

    /// Bulk-seed the persistent store (cold start, no events).
    pub(crate) async fn store_seed(&self, ns: &str, key: &str, ids: &[String]) -> Result<()> {
        if let Some(store) = &self.store {
            let inserted = store.add_many(ns, key, ids).await?;
            if inserted > 0 {
                debug!(ns, key, inserted, "seeded dedup store");
            }
        }
        Ok(())
    }

    /// Prune one persistent scope down to `keep` ids. Called after the
    /// in-memory set trimmed, so store growth tracks memory growth.
    pub(crate) async fn store_prune(&self, ns: &str, key: &str, keep: usize) -> Result<()> {
        if let Some(store) = &self.store {
            let deleted = store.prune(ns, key, keep).await?;
            if deleted > 0 {
                debug!(ns, key, deleted, "pruned dedup store");
            }
        }
        Ok(())
    }
}

/// One registered watch job.
pub(crate) enum Job {
    Thread(ThreadWatch),
    Forum(ForumWatch),
    User(UserWatch),
    Keyword(KeywordWatch),
    Bytes(BytesWatch),
}

impl Job {
    fn kind(&self) -> WatchKind {
        match self {
            Job::Thread(_) => WatchKind::Thread,
            Job::Forum(_) => WatchKind::Forum,
            Job::User(_) => WatchKind::User,
            Job::Keyword(_) => WatchKind::Keyword,
            Job::Bytes(_) => WatchKind::Bytes,
        }
    }

    fn interval(&self) -> Duration {
        match self {
            Job::Thread(w) => w.interval,
            Job::Forum(w) => w.interval,
            Job::User(w) => w.interval,
            Job::Keyword(w) => w.interval,
            Job::Bytes(w) => w.interval,
        }
    }

    fn label(&self) -> String {
        match self {
            Job::Thread(w) => format!("tid {}", w.tid),
            Job::Forum(w) => format!("fid {}", w.fid),
            Job::User(w) => format!("uid {}", w.uid),
            Job::Keyword(w) => format!("pattern {}", w.keyword),
            Job::Bytes(_) => "own account".to_string(),
        }
    }

    /// Run one poll iteration. State mutation stays inside the job; shared
    /// state is only touched through the context's atomic store operations.
    async fn poll(&mut self, cx: &WatchContext) -> Result<()> {
        match self {
            Job::Thread(w) => w.poll(cx).await,
            Job::Forum(w) => w.poll(cx).await,
            Job::User(w) => w.poll(cx).await,
            Job::Keyword(w) => w.poll(cx).await,
            Job::Bytes(w) => w.poll(cx).await,
        }
    }
}

/// Cooperative stop handle, cheap to clone before the watcher starts.
#[derive(Debug, Clone)]
pub struct WatcherHandle {
    running: Arc<AtomicBool>,
}

impl WatcherHandle {
    /// Request a stop. Each job task observes the flag between iterations;
    /// in-flight fetches are allowed to complete.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Polls the upstream API for new activity and fires the notifier.
///
/// Register jobs with the `watch_*` builder methods, then call
/// [`Watcher::start`]. An "isolated" watch that must not share scheduling
/// with the rest is simply a second `Watcher` with a single job registered;
/// there is no special-cased scheduling path.
pub struct Watcher {
    cx: Arc<WatchContext>,
    jobs: Vec<Job>,
    error_sink: Option<Arc<dyn ErrorSink>>,
    running: Arc<AtomicBool>,
}

impl Watcher {
    /// Create a watcher over a client and notifier with the given config.
    pub fn new(
        client: Arc<dyn BoardClient>,
        notifier: Arc<dyn Notifier>,
        config: WatcherConfig,
    ) -> Result<Self> {
        config.validate()?;
        let gate = Arc::new(RateLimitGate::new(Duration::from_secs(
            config.rate_limit_cooldown_secs,
        )));
        Ok(Self {
            cx: Arc::new(WatchContext {
                client,
                notifier,
                store: None,
                gate,
                config,
                credential: "default".to_string(),
            }),
            jobs: Vec::new(),
            error_sink: None,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Back seen-state with a persistent dedup store.
    pub fn with_store(mut self, store: Arc<dyn DedupStore>) -> Self {
        self.context_mut().store = Some(store);
        self
    }

    /// Route per-job errors to a sink instead of only logging them.
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = Some(sink);
        self
    }

    /// Share a rate-limit gate with other watchers using the same
    /// credential.
    pub fn with_rate_limit_gate(mut self, gate: Arc<RateLimitGate>) -> Self {
        self.context_mut().gate = gate;
        self
    }

    /// Label the credential this watcher's client authenticates with, for
    /// rate-limit scoping and log redaction.
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.context_mut().credential = credential.into();
        self
    }

    /// Watch one thread for new replies. `interval: None` uses the
    /// configured default.
    pub fn watch_thread(mut self, tid: u64, interval: Option<Duration>) -> Self {
        let interval =
            interval.unwrap_or(Duration::from_secs(self.cx.config.intervals.thread_secs));
        let bounds = self.cx.config.seen.thread;
        self.jobs.push(Job::Thread(ThreadWatch::new(tid, interval, bounds)));
        self
    }

    /// Watch a forum for new threads.
    pub fn watch_forum(mut self, fid: u64, interval: Option<Duration>) -> Self {
        let interval = interval.unwrap_or(Duration::from_secs(self.cx.config.intervals.forum_secs));
        let bounds = self.cx.config.seen.forum;
        self.jobs.push(Job::Forum(ForumWatch::new(fid, interval, bounds)));
        self
    }

    /// Watch a user for new threads, and optionally new posts.
    pub fn watch_user(mut self, uid: u64, mode: UserWatchMode, interval: Option<Duration>) -> Self {
        let interval = interval.unwrap_or(Duration::from_secs(self.cx.config.intervals.user_secs));
        let bounds = self.cx.config.seen.user;
        self.jobs.push(Job::User(UserWatch::new(uid, mode, interval, bounds)));
        self
    }

    /// Watch forums for a keyword in thread subjects and recent post bodies.
    ///
    /// An invalid regex falls back to a literal, escaped match rather than
    /// failing registration.
    pub fn watch_keyword(
        mut self,
        keyword: &str,
        fids: &[u64],
        case_sensitive: bool,
        interval: Option<Duration>,
    ) -> Self {
        let interval =
            interval.unwrap_or(Duration::from_secs(self.cx.config.intervals.keyword_secs));
        let bounds = self.cx.config.seen.keyword;
        self.jobs.push(Job::Keyword(KeywordWatch::new(
            keyword,
            fids.to_vec(),
            case_sensitive,
            interval,
            bounds,
        )));
        self
    }

    /// Watch the authenticated account for incoming transfers.
    pub fn watch_bytes(mut self, interval: Option<Duration>) -> Self {
        let interval = interval.unwrap_or(Duration::from_secs(self.cx.config.intervals.bytes_secs));
        let bounds = self.cx.config.seen.bytes;
        self.jobs.push(Job::Bytes(BytesWatch::new(interval, bounds)));
        self
    }

    /// Number of registered jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Obtain a stop handle before starting.
    pub fn handle(&self) -> WatcherHandle {
        WatcherHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Spawn one polling task per registered job and wait for all of them.
    ///
    /// Returns when every task has observed a [`WatcherHandle::stop`]. Jobs
    /// poll immediately on start, then sleep their interval between
    /// iterations.
    pub async fn start(self) -> Result<()> {
        if self.jobs.is_empty() {
            return Err(Error::config("no watch jobs registered"));
        }
        self.running.store(true, Ordering::SeqCst);

        let mut kind_counts = std::collections::HashMap::new();
        for job in &self.jobs {
            *kind_counts.entry(job.kind()).or_insert(0usize) += 1;
        }
        info!(jobs = self.jobs.len(), ?kind_counts, "watcher starting");

        let mut handles = Vec::with_capacity(self.jobs.len());
        for mut job in self.jobs {
            let cx = Arc::clone(&self.cx);
            let sink = self.error_sink.clone();
            let running = Arc::clone(&self.running);

            handles.push(tokio::spawn(async move {
                while running.load(Ordering::SeqCst) {
                    if cx.gate.is_limited(&cx.credential) {
                        debug!(
                            watch = %job.kind(),
                            target = %job.label(),
                            "credential rate limited, skipping cycle"
                        );
                    } else if let Err(error) = job.poll(&cx).await {
                        if matches!(error, Error::RateLimited(_)) {
                            cx.gate.mark(&cx.credential);
                        }
                        warn!(
                            watch = %job.kind(),
                            target = %job.label(),
                            %error,
                            "watch iteration failed"
                        );
                        if let Some(sink) = &sink {
                            sink.on_error(job.kind(), &error).await;
                        }
                    }
                    tokio::time::sleep(job.interval()).await;
                }
                debug!(watch = %job.kind(), target = %job.label(), "watch loop stopped");
            }));
        }

        for handle in handles {
            // A panic in a job task would surface here; job errors never do.
            let _ = handle.await;
        }
        info!("watcher stopped");
        Ok(())
    }

    fn context_mut(&mut self) -> &mut WatchContext {
        // Registration happens before start(), while this Arc is unique.
        Arc::get_mut(&mut self.cx).expect("watcher context modified after start")
    }
}
