// # Dedup Store Trait
//
// Defines the interface for persistent "already seen" identifier tracking.
//
// ## Purpose
//
// Without a persistent store, every watch job's seen state lives in memory
// only and a restart re-fires the last poll's events as "new". A dedup store
// survives restarts, so each (namespace, key, event_id) triple produces at
// most one notification across process lifetimes.
//
// ## Implementations
//
// - In-memory: [`MemoryDedupStore`](crate::store::MemoryDedupStore) (tests,
//   deployments where restart replay is acceptable)
// - SQLite-backed: `boardwatch-store-sqlite` crate
//
// ## Thread safety
//
// All methods must be safe to call concurrently from multiple watch tasks,
// and every operation must be an atomic unit, in particular `add_if_new`,
// which the emit path relies on for its at-most-once guarantee.
//
// ## Durability
//
// Persistent implementations must make inserts and deletes durable before
// returning. An acknowledged-but-lost write defeats the store's purpose.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Well-known namespaces, one per watch kind.
///
/// Thread ids and post ids are small integers drawn from different id
/// spaces; keeping them in separate namespaces (and, within the keyword
/// watch, separate namespaces for subject and body hits) is what prevents a
/// numeric collision from suppressing an unrelated event.
pub mod namespace {
    /// Post ids seen per watched thread (key = tid)
    pub const THREAD_REPLIES: &str = "thread_replies";
    /// Thread ids seen per watched forum (key = fid)
    pub const FORUM_THREADS: &str = "forum_threads";
    /// Thread ids seen per watched user (key = uid)
    pub const USER_THREADS: &str = "user_threads";
    /// Post ids seen per watched user (key = uid)
    pub const USER_POSTS: &str = "user_posts";
    /// Thread ids scanned per keyword pattern (key = pattern)
    pub const KEYWORD_THREADS: &str = "keyword_threads";
    /// Post ids scanned per keyword pattern (key = pattern)
    pub const KEYWORD_POSTS: &str = "keyword_posts";
    /// Transfer ids seen for the watching account (key = uid)
    pub const BYTES_RECEIVED: &str = "bytes_received";
}

/// Trait for deduplication store implementations
///
/// All operations are scoped by `(namespace, key)`; `event_id` values are
/// opaque strings so heterogeneous id spaces (numeric post ids, string
/// transfer ids) share one schema.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Check whether an id has been seen.
    async fn has(&self, namespace: &str, key: &str, event_id: &str) -> Result<bool, crate::Error>;

    /// Mark an id as seen, ignoring it if already present.
    async fn add(&self, namespace: &str, key: &str, event_id: &str) -> Result<(), crate::Error>;

    /// Atomic check-and-insert.
    ///
    /// Returns `true` only the first time a given id is seen for this
    /// `(namespace, key)`. Preferred over separate `has` + `add` calls,
    /// which would race between concurrently-running tasks.
    async fn add_if_new(
        &self,
        namespace: &str,
        key: &str,
        event_id: &str,
    ) -> Result<bool, crate::Error>;

    /// Filter a batch of ids down to those not yet seen.
    ///
    /// Must use a single bulk lookup rather than one round trip per id, and
    /// must preserve the input order of the survivors.
    async fn filter_new(
        &self,
        namespace: &str,
        key: &str,
        event_ids: &[String],
    ) -> Result<Vec<String>, crate::Error>;

    /// Bulk-insert ids, skipping those already present.
    ///
    /// Used for cold-start seeding, where the current snapshot is recorded
    /// without emitting events. Returns the number actually inserted.
    async fn add_many(
        &self,
        namespace: &str,
        key: &str,
        event_ids: &[String],
    ) -> Result<usize, crate::Error>;

    /// Keep only the `keep` most-recently-seen ids for one scope.
    ///
    /// Returns the number of records deleted.
    async fn prune(&self, namespace: &str, key: &str, keep: usize) -> Result<usize, crate::Error>;

    /// Delete every record older than `age`, across all scopes.
    ///
    /// Returns the number of records deleted.
    async fn purge_older_than(&self, age: Duration) -> Result<usize, crate::Error>;

    /// Record counts per namespace.
    async fn stats(&self) -> Result<HashMap<String, u64>, crate::Error>;

    /// Delete records, optionally scoped to a namespace or namespace+key.
    ///
    /// `clear(None, _)` wipes everything; a key without a namespace is an
    /// invalid input.
    async fn clear(
        &self,
        namespace: Option<&str>,
        key: Option<&str>,
    ) -> Result<usize, crate::Error>;
}
