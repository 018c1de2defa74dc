// # Board Client Trait
//
// Defines the read capability the watch loops consume. Implementations own
// HTTP semantics, authentication, field selection, and socket-level retries;
// none of that belongs in the engine.
//
// ## Data-shape tolerance
//
// Malformed or partially-missing upstream rows must be reported as an empty
// result (`Ok(None)` / `Ok(vec![])`), not as an error. A watch loop treats
// "no data this cycle" as benign; only genuine transport faults should be
// returned as `Err`.
//
// ## Rate limiting
//
// When the upstream signals exhaustion, implementations return
// [`Error::RateLimited`](crate::Error::RateLimited). The watcher then marks
// the shared [`RateLimitGate`](crate::ratelimit::RateLimitGate) so every job
// using the same credential backs off for the cooldown window.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Post, ThreadMeta, ThreadSummary, Transfer};

/// Trait for upstream read access
///
/// All methods must be safe to call concurrently from multiple watch tasks.
#[async_trait]
pub trait BoardClient: Send + Sync {
    /// Fetch lightweight metadata for one thread.
    ///
    /// Returns `Ok(None)` when the thread does not exist or the response
    /// was malformed.
    async fn thread_meta(&self, tid: u64) -> Result<Option<ThreadMeta>>;

    /// Fetch one page of a thread's posts, oldest first within the page.
    async fn thread_posts(&self, tid: u64, page: u32, per_page: u32) -> Result<Vec<Post>>;

    /// Fetch the current thread listing for a forum (single unpaginated
    /// snapshot; the cold-start seed reads exactly this).
    async fn forum_threads(&self, fid: u64) -> Result<Vec<ThreadSummary>>;

    /// Fetch one page of threads authored by a user.
    async fn user_threads(&self, uid: u64, page: u32, per_page: u32)
    -> Result<Vec<ThreadSummary>>;

    /// Fetch one page of posts authored by a user.
    async fn user_posts(&self, uid: u64, page: u32, per_page: u32) -> Result<Vec<Post>>;

    /// Resolve the authenticated account's own user id.
    ///
    /// Returns `Ok(None)` when the upstream response is empty or carries no
    /// id; callers treat that as retryable, never as a permanent failure.
    async fn whoami(&self) -> Result<Option<u64>>;

    /// Fetch recent incoming transfers for a user, newest first.
    async fn incoming_transfers(&self, uid: u64, per_page: u32) -> Result<Vec<Transfer>>;
}
