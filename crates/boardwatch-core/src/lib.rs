// # boardwatch-core
//
// Core library for polling a forum-style API and notifying on new activity.
//
// ## Architecture Overview
//
// - **BoardClient**: Trait for fetching threads, posts, and transfers
// - **Notifier**: Trait for delivering change events
// - **DedupStore**: Trait for persistent first-sighting tracking
// - **Watcher**: Supervisor that runs one isolated polling task per watch job
// - **TtlCache** / **PageWalk** / **RateLimitGate**: Supporting plumbing for
//   response caching, bounded pagination, and credential-wide backoff
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from transports and
//    storage backends
// 2. **Failure Isolation**: One watch job's fault never stops its siblings
// 3. **Plugin-Based**: Persistent stores implement `DedupStore` and plug in
//    at construction time
// 4. **Library-First**: The watcher embeds into any async host; there is no
//    built-in runtime or delivery surface

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod paginator;
pub mod ratelimit;
pub mod seen;
pub mod store;
pub mod traits;
pub mod watch;

// Re-export core types for convenience
pub use cache::{CacheStats, Lookup, TtlCache};
pub use config::{IntervalConfig, SeenBounds, StoreConfig, WatcherConfig};
pub use error::{Error, Result};
pub use model::{Event, Post, ThreadMeta, ThreadSummary, Transfer, WatchKind};
pub use paginator::PageWalk;
pub use ratelimit::RateLimitGate;
pub use seen::BoundedSeen;
pub use store::MemoryDedupStore;
pub use traits::{BoardClient, ChannelNotifier, DedupStore, ErrorSink, Notifier, namespace};
pub use watch::{UserWatchMode, Watcher, WatcherHandle};
