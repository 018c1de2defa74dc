//! User watch: new threads (and optionally posts) by one tracked user
//!
//! The thread and post sub-checks run independently, each against its own
//! seen-set and its own dedup namespace. The two streams never share
//! identifiers: thread ids and post ids are both small integers and a
//! numeric collision between them must not suppress either event.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::WatchContext;
use crate::config::SeenBounds;
use crate::error::Result;
use crate::model::{Event, snippet};
use crate::seen::BoundedSeen;
use crate::traits::namespace;

/// Listing page size for both sub-checks
const PAGE_SIZE: u32 = 20;

/// What a user watch reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserWatchMode {
    /// New threads only
    Threads,
    /// New threads and new posts
    ThreadsAndPosts,
}

pub(crate) struct UserWatch {
    pub uid: u64,
    pub interval: Duration,
    mode: UserWatchMode,
    initialized: bool,
    seen_tids: BoundedSeen<u64>,
    seen_pids: BoundedSeen<u64>,
}

impl UserWatch {
    pub fn new(uid: u64, mode: UserWatchMode, interval: Duration, bounds: SeenBounds) -> Self {
        Self {
            uid,
            interval,
            mode,
            initialized: false,
            seen_tids: BoundedSeen::new(bounds),
            seen_pids: BoundedSeen::new(bounds),
        }
    }

    pub async fn poll(&mut self, cx: &WatchContext) -> Result<()> {
        let key = self.uid.to_string();

        self.check_threads(cx, &key).await?;
        if self.mode == UserWatchMode::ThreadsAndPosts {
            self.check_posts(cx, &key).await?;
        }
        self.initialized = true;

        if self.seen_tids.take_trimmed() {
            cx.store_prune(namespace::USER_THREADS, &key, self.seen_tids.bounds().cap)
                .await?;
        }
        if self.seen_pids.take_trimmed() {
            cx.store_prune(namespace::USER_POSTS, &key, self.seen_pids.bounds().cap)
                .await?;
        }
        Ok(())
    }

    async fn check_threads(&mut self, cx: &WatchContext, key: &str) -> Result<()> {
        let mut threads = cx.client.user_threads(self.uid, 1, PAGE_SIZE).await?;

        if !self.initialized {
            let ids: Vec<String> = threads.iter().map(|t| t.tid.to_string()).collect();
            self.seen_tids.extend(threads.iter().map(|t| t.tid));
            cx.store_seed(namespace::USER_THREADS, key, &ids).await?;
            debug!(uid = self.uid, seeded = ids.len(), "user thread watch seeded");
            return Ok(());
        }

        threads.sort_by_key(|t| t.dateline);
        for thread in threads {
            if self.seen_tids.contains(&thread.tid) {
                continue;
            }
            let first = cx
                .first_sighting(namespace::USER_THREADS, key, &thread.tid.to_string())
                .await?;
            self.seen_tids.insert(thread.tid);
            if !first {
                continue;
            }

            cx.notifier
                .notify(Event::UserThread {
                    uid: self.uid,
                    tid: thread.tid,
                    subject: thread.subject,
                    dateline: thread.dateline,
                })
                .await?;
        }
        Ok(())
    }

    async fn check_posts(&mut self, cx: &WatchContext, key: &str) -> Result<()> {
        let mut posts = cx.client.user_posts(self.uid, 1, PAGE_SIZE).await?;

        if !self.initialized {
            let ids: Vec<String> = posts.iter().map(|p| p.pid.to_string()).collect();
            self.seen_pids.extend(posts.iter().map(|p| p.pid));
            cx.store_seed(namespace::USER_POSTS, key, &ids).await?;
            debug!(uid = self.uid, seeded = ids.len(), "user post watch seeded");
            return Ok(());
        }

        posts.sort_by_key(|p| p.dateline);
        for post in posts {
            if self.seen_pids.contains(&post.pid) {
                continue;
            }
            let first = cx
                .first_sighting(namespace::USER_POSTS, key, &post.pid.to_string())
                .await?;
            self.seen_pids.insert(post.pid);
            if !first {
                continue;
            }

            cx.notifier
                .notify(Event::UserPost {
                    uid: self.uid,
                    tid: post.tid,
                    pid: post.pid,
                    subject: post.subject,
                    snippet: snippet(&post.message),
                    dateline: post.dateline,
                })
                .await?;
        }
        Ok(())
    }
}
