//! Thread watch: new replies in one tracked thread
//!
//! The thread's `last_post` timestamp is the high-water mark. The first
//! observation records it as the baseline and emits nothing; afterwards an
//! advanced timestamp triggers a fetch of the thread's last reply page, and
//! every reply that is both newer than the baseline and unseen fires one
//! event. The baseline advances to the new timestamp whether or not any
//! replies were resolved, so a lossy reply fetch cannot wedge the watch.

use std::time::Duration;
use tracing::debug;

use super::WatchContext;
use crate::config::SeenBounds;
use crate::error::Result;
use crate::model::{Event, snippet};
use crate::seen::BoundedSeen;
use crate::traits::namespace;

/// Replies per page when fetching the thread's tail
const REPLY_PAGE_SIZE: u32 = 10;

pub(crate) struct ThreadWatch {
    pub tid: u64,
    pub interval: Duration,
    /// Unix timestamp of the newest post seen so far; 0 = not yet baselined
    last_post: u64,
    seen: BoundedSeen<u64>,
}

impl ThreadWatch {
    pub fn new(tid: u64, interval: Duration, bounds: SeenBounds) -> Self {
        Self {
            tid,
            interval,
            last_post: 0,
            seen: BoundedSeen::new(bounds),
        }
    }

    pub async fn poll(&mut self, cx: &WatchContext) -> Result<()> {
        let Some(meta) = cx.client.thread_meta(self.tid).await? else {
            return Ok(());
        };

        if self.last_post == 0 {
            self.last_post = meta.last_post;
            debug!(tid = self.tid, baseline = meta.last_post, "thread watch baselined");
            return Ok(());
        }
        if meta.last_post <= self.last_post {
            return Ok(());
        }

        // numreplies excludes the opening post, hence the +1.
        let last_page = ((meta.num_replies + 1).div_ceil(REPLY_PAGE_SIZE as u64)).max(1) as u32;
        let mut posts = cx
            .client
            .thread_posts(self.tid, last_page, REPLY_PAGE_SIZE)
            .await?;

        if posts.is_empty() {
            // The timestamp moved but the reply fetch resolved nothing.
            // Synthesize one event from the metadata so the change is not
            // silently swallowed.
            cx.notifier
                .notify(Event::ThreadReply {
                    tid: self.tid,
                    pid: None,
                    uid: None,
                    subject: meta.subject.clone(),
                    snippet: String::new(),
                    dateline: meta.last_post,
                })
                .await?;
            self.last_post = meta.last_post;
            return Ok(());
        }

        posts.sort_by_key(|p| p.dateline);
        let key = self.tid.to_string();

        for post in posts {
            if post.dateline <= self.last_post {
                continue;
            }
            if self.seen.contains(&post.pid) {
                continue;
            }
            // Mark seen before the callback: a callback failure must not
            // cause duplicate emission on the retry.
            let first = cx
                .first_sighting(namespace::THREAD_REPLIES, &key, &post.pid.to_string())
                .await?;
            self.seen.insert(post.pid);
            if !first {
                continue;
            }

            cx.notifier
                .notify(Event::ThreadReply {
                    tid: self.tid,
                    pid: Some(post.pid),
                    uid: Some(post.uid),
                    subject: meta.subject.clone(),
                    snippet: snippet(&post.message),
                    dateline: post.dateline,
                })
                .await?;
        }

        self.last_post = meta.last_post;
        if self.seen.take_trimmed() {
            cx.store_prune(namespace::THREAD_REPLIES, &key, self.seen.bounds().cap)
                .await?;
        }
        Ok(())
    }
}
