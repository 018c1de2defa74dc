//! Forum watch: new threads in one tracked forum

use std::time::Duration;
use tracing::debug;

use super::WatchContext;
use crate::config::SeenBounds;
use crate::error::Result;
use crate::model::Event;
use crate::seen::BoundedSeen;
use crate::traits::namespace;

pub(crate) struct ForumWatch {
    pub fid: u64,
    pub interval: Duration,
    /// True after the first poll has seeded the snapshot
    initialized: bool,
    seen: BoundedSeen<u64>,
}

impl ForumWatch {
    pub fn new(fid: u64, interval: Duration, bounds: SeenBounds) -> Self {
        Self {
            fid,
            interval,
            initialized: false,
            seen: BoundedSeen::new(bounds),
        }
    }

    pub async fn poll(&mut self, cx: &WatchContext) -> Result<()> {
        let mut threads = cx.client.forum_threads(self.fid).await?;
        let key = self.fid.to_string();

        if !self.initialized {
            // Cold start: record the current snapshot, emit nothing.
            let ids: Vec<String> = threads.iter().map(|t| t.tid.to_string()).collect();
            self.seen.extend(threads.iter().map(|t| t.tid));
            cx.store_seed(namespace::FORUM_THREADS, &key, &ids).await?;
            self.initialized = true;
            debug!(fid = self.fid, seeded = ids.len(), "forum watch seeded");
            return Ok(());
        }

        threads.sort_by_key(|t| t.dateline);
        for thread in threads {
            if self.seen.contains(&thread.tid) {
                continue;
            }
            let first = cx
                .first_sighting(namespace::FORUM_THREADS, &key, &thread.tid.to_string())
                .await?;
            self.seen.insert(thread.tid);
            if !first {
                continue;
            }

            cx.notifier
                .notify(Event::NewThread {
                    fid: self.fid,
                    tid: thread.tid,
                    uid: thread.uid,
                    subject: thread.subject,
                    dateline: thread.dateline,
                })
                .await?;
        }

        if self.seen.take_trimmed() {
            cx.store_prune(namespace::FORUM_THREADS, &key, self.seen.bounds().cap)
                .await?;
        }
        Ok(())
    }
}
