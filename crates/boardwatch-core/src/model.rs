//! Record and event types
//!
//! Records are the typed shapes the [`BoardClient`](crate::traits::BoardClient)
//! returns; events are what the watcher emits through a
//! [`Notifier`](crate::traits::Notifier). All timestamps are unix epoch
//! seconds ("datelines"), matching the upstream API.

use serde::{Deserialize, Serialize};

/// Maximum length of an event snippet, in characters.
pub const SNIPPET_LEN: usize = 200;

/// Lightweight thread metadata used by the thread watch.
///
/// `last_post` is a unix timestamp (not a post id); `first_post` would be a
/// post id, which is why the two are never compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMeta {
    pub tid: u64,
    pub subject: String,
    /// Unix timestamp of the most recent post in the thread
    pub last_post: u64,
    /// Reply count, excluding the opening post
    pub num_replies: u64,
}

/// One row of a forum or user thread listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub tid: u64,
    pub uid: u64,
    pub subject: String,
    pub dateline: u64,
}

/// One post, with raw markup in `message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub pid: u64,
    pub tid: u64,
    pub uid: u64,
    pub subject: String,
    pub message: String,
    pub dateline: u64,
}

/// One incoming value transfer.
///
/// Transfer ids are opaque strings: they come from a different id namespace
/// than thread/post ids and must never be compared numerically with them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: String,
    pub from_user: String,
    pub amount: f64,
    pub reason: String,
    pub dateline: u64,
}

/// The kind of watch job an event or error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchKind {
    Thread,
    Forum,
    User,
    Keyword,
    Bytes,
}

impl std::fmt::Display for WatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WatchKind::Thread => "thread",
            WatchKind::Forum => "forum",
            WatchKind::User => "user",
            WatchKind::Keyword => "keyword",
            WatchKind::Bytes => "bytes",
        };
        f.write_str(name)
    }
}

/// A detected change, emitted at most once per identifier.
///
/// Within one poll cycle events are emitted in non-decreasing `dateline`
/// order; across cycles they follow poll order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A new reply in a watched thread
    ThreadReply {
        tid: u64,
        /// `None` when the reply fetch yielded no rows and the event was
        /// synthesized from the thread's advanced lastpost timestamp alone
        pid: Option<u64>,
        uid: Option<u64>,
        subject: String,
        snippet: String,
        dateline: u64,
    },

    /// A new thread in a watched forum
    NewThread {
        fid: u64,
        tid: u64,
        uid: u64,
        subject: String,
        dateline: u64,
    },

    /// A new thread authored by a watched user
    UserThread {
        uid: u64,
        tid: u64,
        subject: String,
        dateline: u64,
    },

    /// A new post authored by a watched user
    UserPost {
        uid: u64,
        tid: u64,
        pid: u64,
        subject: String,
        snippet: String,
        dateline: u64,
    },

    /// A keyword pattern matched a thread subject (`pid: None`) or a post
    /// body (`pid: Some`)
    KeywordMatch {
        keyword: String,
        fid: u64,
        tid: u64,
        pid: Option<u64>,
        subject: String,
        snippet: String,
        dateline: u64,
    },

    /// An incoming value transfer to the watching account
    BytesReceived {
        id: String,
        amount: f64,
        reason: String,
        from_user: String,
        dateline: u64,
    },
}

impl Event {
    /// The watch kind that produces this event.
    pub fn kind(&self) -> WatchKind {
        match self {
            Event::ThreadReply { .. } => WatchKind::Thread,
            Event::NewThread { .. } => WatchKind::Forum,
            Event::UserThread { .. } | Event::UserPost { .. } => WatchKind::User,
            Event::KeywordMatch { .. } => WatchKind::Keyword,
            Event::BytesReceived { .. } => WatchKind::Bytes,
        }
    }

    /// Unix timestamp of the underlying change.
    pub fn dateline(&self) -> u64 {
        match self {
            Event::ThreadReply { dateline, .. }
            | Event::NewThread { dateline, .. }
            | Event::UserThread { dateline, .. }
            | Event::UserPost { dateline, .. }
            | Event::KeywordMatch { dateline, .. }
            | Event::BytesReceived { dateline, .. } => *dateline,
        }
    }
}

/// Truncate raw message text to [`SNIPPET_LEN`] characters.
///
/// Markup-to-text conversion is the transport layer's concern; the engine
/// only bounds the payload size, cutting on a char boundary.
pub fn snippet(text: &str) -> String {
    let mut out: String = text.chars().take(SNIPPET_LEN).collect();
    if text.chars().count() > SNIPPET_LEN {
        out.push('…');
    }
    out
}
