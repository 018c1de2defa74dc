//! Keyword watch: pattern matches in thread subjects and fresh post bodies
//!
//! For each configured forum the watch scans the current thread listing.
//! A subject match emits immediately (with no post id). Threads older than
//! the freshness window are marked seen without fetching their posts: the
//! window keeps per-cycle cost bounded instead of re-scanning every stale
//! thread forever. Fresh, non-matching threads get a small page of recent
//! posts scanned against the pattern.
//!
//! Thread ids and post ids live in disjoint seen-sets and disjoint dedup
//! namespaces. Both are small integers; sharing one set would let a thread
//! with tid=X silently suppress an unrelated post with pid=X.

use regex::{Regex, RegexBuilder};
use std::time::Duration;
use tracing::{debug, warn};

use super::WatchContext;
use crate::config::SeenBounds;
use crate::error::Result;
use crate::model::{Event, snippet};
use crate::seen::BoundedSeen;
use crate::traits::namespace;

/// Posts scanned per fresh thread
const POST_SCAN_SIZE: u32 = 5;

pub(crate) struct KeywordWatch {
    pub keyword: String,
    pub interval: Duration,
    pattern: Regex,
    fids: Vec<u64>,
    seen_tids: BoundedSeen<u64>,
    seen_pids: BoundedSeen<u64>,
}

impl KeywordWatch {
    pub fn new(
        keyword: &str,
        fids: Vec<u64>,
        case_sensitive: bool,
        interval: Duration,
        bounds: SeenBounds,
    ) -> Self {
        let pattern = compile_pattern(keyword, case_sensitive);
        Self {
            keyword: keyword.to_string(),
            interval,
            pattern,
            fids,
            seen_tids: BoundedSeen::new(bounds),
            seen_pids: BoundedSeen::new(bounds),
        }
    }

    pub async fn poll(&mut self, cx: &WatchContext) -> Result<()> {
        if self.fids.is_empty() {
            // Configuration issue, not a fault: keep the job registered
            // and skip the cycle.
            warn!(
                keyword = %self.keyword,
                "keyword watch has no forum ids configured, skipping cycle"
            );
            return Ok(());
        }

        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let fids = self.fids.clone();
        for fid in fids {
            self.scan_forum(cx, fid, now).await?;
        }

        if self.seen_tids.take_trimmed() {
            cx.store_prune(namespace::KEYWORD_THREADS, &self.keyword, self.seen_tids.bounds().cap)
                .await?;
        }
        if self.seen_pids.take_trimmed() {
            cx.store_prune(namespace::KEYWORD_POSTS, &self.keyword, self.seen_pids.bounds().cap)
                .await?;
        }
        Ok(())
    }

    async fn scan_forum(&mut self, cx: &WatchContext, fid: u64, now: u64) -> Result<()> {
        let key = self.keyword.clone();
        let threads = cx.client.forum_threads(fid).await?;

        for thread in threads {
            if self.seen_tids.contains(&thread.tid) {
                continue;
            }
            let tid_str = thread.tid.to_string();
            if cx.store_has(namespace::KEYWORD_THREADS, &key, &tid_str).await? {
                self.seen_tids.insert(thread.tid);
                continue;
            }

            if self.pattern.is_match(&thread.subject) {
                self.mark_thread(cx, &key, thread.tid).await?;
                cx.notifier
                    .notify(Event::KeywordMatch {
                        keyword: self.keyword.clone(),
                        fid,
                        tid: thread.tid,
                        pid: None,
                        subject: thread.subject.clone(),
                        snippet: thread.subject.clone(),
                        dateline: thread.dateline,
                    })
                    .await?;
                continue;
            }

            if now.saturating_sub(thread.dateline) > cx.config.keyword_freshness_secs {
                // Stale thread: never body-scan, just stop revisiting it.
                self.mark_thread(cx, &key, thread.tid).await?;
                continue;
            }

            let posts = cx
                .client
                .thread_posts(thread.tid, 1, POST_SCAN_SIZE)
                .await?;
            if posts.is_empty() {
                // Leave the thread unmarked so its posts get scanned once
                // they resolve.
                debug!(tid = thread.tid, "no posts resolved, rescanning next cycle");
                continue;
            }

            for post in posts {
                if self.seen_pids.contains(&post.pid) {
                    continue;
                }
                // Scanned is scanned, match or not: marking only matches
                // would re-fetch the same non-matching bodies every cycle.
                let first = cx
                    .first_sighting(namespace::KEYWORD_POSTS, &key, &post.pid.to_string())
                    .await?;
                self.seen_pids.insert(post.pid);
                if !first {
                    continue;
                }

                if self.pattern.is_match(&post.message) {
                    cx.notifier
                        .notify(Event::KeywordMatch {
                            keyword: self.keyword.clone(),
                            fid,
                            tid: thread.tid,
                            pid: Some(post.pid),
                            subject: thread.subject.clone(),
                            snippet: snippet(&post.message),
                            dateline: post.dateline,
                        })
                        .await?;
                }
            }

            self.mark_thread(cx, &key, thread.tid).await?;
        }
        Ok(())
    }

    async fn mark_thread(&mut self, cx: &WatchContext, key: &str, tid: u64) -> Result<()> {
        self.seen_tids.insert(tid);
        cx.store_mark(namespace::KEYWORD_THREADS, key, &tid.to_string())
            .await
    }
}

/// Compile the keyword as a regex; an invalid pattern degrades to a literal
/// match instead of failing registration.
fn compile_pattern(keyword: &str, case_sensitive: bool) -> Regex {
    RegexBuilder::new(keyword)
        .case_insensitive(!case_sensitive)
        .build()
        .unwrap_or_else(|_| {
            warn!(keyword, "invalid pattern, falling back to literal match");
            RegexBuilder::new(&regex::escape(keyword))
                .case_insensitive(!case_sensitive)
                .build()
                .expect("escaped literal always compiles")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_is_case_insensitive_by_default() {
        let re = compile_pattern("rust", false);
        assert!(re.is_match("RUST for sale"));

        let re = compile_pattern("rust", true);
        assert!(!re.is_match("RUST for sale"));
    }

    #[test]
    fn invalid_pattern_falls_back_to_literal() {
        let re = compile_pattern("c++ [unclosed", false);
        assert!(re.is_match("learning C++ [unclosed today"));
        assert!(!re.is_match("plain text"));
    }
}
