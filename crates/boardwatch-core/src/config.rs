//! Configuration types for the boardwatch engine

use serde::{Deserialize, Serialize};

/// Main watcher configuration
///
/// Every field has a serde default, so an empty config deserializes to the
/// same values the watcher uses when constructed programmatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Default poll intervals per watch kind (seconds)
    #[serde(default)]
    pub intervals: IntervalConfig,

    /// Bounded seen-set sizing per watch kind
    #[serde(default)]
    pub seen: SeenConfig,

    /// Deduplication store selection
    #[serde(default)]
    pub store: StoreConfig,

    /// Threads older than this many seconds are not body-scanned by the
    /// keyword watch (they are marked seen and skipped)
    #[serde(default = "default_keyword_freshness_secs")]
    pub keyword_freshness_secs: u64,

    /// Shared back-off window after an upstream rate-limit signal (seconds)
    #[serde(default = "default_rate_limit_cooldown_secs")]
    pub rate_limit_cooldown_secs: u64,

    /// Courtesy delay between paginated requests (milliseconds)
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Default TTL for cached positive lookups (seconds)
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// TTL for cached negative ("not found") lookups (seconds)
    #[serde(default = "default_cache_none_ttl_secs")]
    pub cache_none_ttl_secs: u64,

    /// Dedup records older than this many days are eligible for purging
    #[serde(default = "default_purge_days")]
    pub purge_days: u64,
}

impl WatcherConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            intervals: IntervalConfig::default(),
            seen: SeenConfig::default(),
            store: StoreConfig::default(),
            keyword_freshness_secs: default_keyword_freshness_secs(),
            rate_limit_cooldown_secs: default_rate_limit_cooldown_secs(),
            page_delay_ms: default_page_delay_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_none_ttl_secs: default_cache_none_ttl_secs(),
            purge_days: default_purge_days(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.intervals.validate()?;
        self.seen.validate()?;
        if self.rate_limit_cooldown_secs == 0 {
            return Err(crate::Error::config("rate_limit_cooldown_secs must be > 0"));
        }
        Ok(())
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Default poll interval per watch kind, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalConfig {
    #[serde(default = "default_thread_interval")]
    pub thread_secs: u64,

    #[serde(default = "default_forum_interval")]
    pub forum_secs: u64,

    #[serde(default = "default_user_interval")]
    pub user_secs: u64,

    #[serde(default = "default_keyword_interval")]
    pub keyword_secs: u64,

    #[serde(default = "default_bytes_interval")]
    pub bytes_secs: u64,
}

impl IntervalConfig {
    fn validate(&self) -> Result<(), crate::Error> {
        let all = [
            self.thread_secs,
            self.forum_secs,
            self.user_secs,
            self.keyword_secs,
            self.bytes_secs,
        ];
        if all.contains(&0) {
            return Err(crate::Error::config("poll intervals must be > 0"));
        }
        Ok(())
    }
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            thread_secs: default_thread_interval(),
            forum_secs: default_forum_interval(),
            user_secs: default_user_interval(),
            keyword_secs: default_keyword_interval(),
            bytes_secs: default_bytes_interval(),
        }
    }
}

/// Seen-set bounds: `cap` is the overflow threshold, `trim_to` the size
/// trimmed down to once the cap is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenBounds {
    pub cap: usize,
    pub trim_to: usize,
}

/// Seen-set sizing per watch kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeenConfig {
    #[serde(default = "default_thread_bounds")]
    pub thread: SeenBounds,

    #[serde(default = "default_forum_bounds")]
    pub forum: SeenBounds,

    #[serde(default = "default_user_bounds")]
    pub user: SeenBounds,

    #[serde(default = "default_keyword_bounds")]
    pub keyword: SeenBounds,

    #[serde(default = "default_bytes_bounds")]
    pub bytes: SeenBounds,
}

impl SeenConfig {
    fn validate(&self) -> Result<(), crate::Error> {
        for bounds in [
            self.thread,
            self.forum,
            self.user,
            self.keyword,
            self.bytes,
        ] {
            if bounds.trim_to == 0 || bounds.trim_to > bounds.cap {
                return Err(crate::Error::config(
                    "seen bounds require 0 < trim_to <= cap",
                ));
            }
        }
        Ok(())
    }
}

impl Default for SeenConfig {
    fn default() -> Self {
        Self {
            thread: default_thread_bounds(),
            forum: default_forum_bounds(),
            user: default_user_bounds(),
            keyword: default_keyword_bounds(),
            bytes: default_bytes_bounds(),
        }
    }
}

/// Deduplication store selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// In-memory only: seen state is lost on restart
    #[default]
    Memory,

    /// SQLite-backed persistent store (implemented by the
    /// `boardwatch-store-sqlite` crate)
    Sqlite {
        /// Path to the database file
        path: String,
    },
}

fn default_thread_interval() -> u64 {
    60
}

fn default_forum_interval() -> u64 {
    120
}

fn default_user_interval() -> u64 {
    120
}

fn default_keyword_interval() -> u64 {
    120
}

fn default_bytes_interval() -> u64 {
    60
}

fn default_thread_bounds() -> SeenBounds {
    SeenBounds {
        cap: 500,
        trim_to: 250,
    }
}

fn default_forum_bounds() -> SeenBounds {
    SeenBounds {
        cap: 1000,
        trim_to: 500,
    }
}

fn default_user_bounds() -> SeenBounds {
    SeenBounds {
        cap: 500,
        trim_to: 250,
    }
}

fn default_keyword_bounds() -> SeenBounds {
    SeenBounds {
        cap: 2000,
        trim_to: 1000,
    }
}

fn default_bytes_bounds() -> SeenBounds {
    SeenBounds {
        cap: 500,
        trim_to: 250,
    }
}

fn default_keyword_freshness_secs() -> u64 {
    3600
}

fn default_rate_limit_cooldown_secs() -> u64 {
    600
}

fn default_page_delay_ms() -> u64 {
    300
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_none_ttl_secs() -> u64 {
    60
}

fn default_purge_days() -> u64 {
    7
}
