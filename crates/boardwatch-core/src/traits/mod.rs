//! Core traits for the boardwatch engine
//!
//! These are the seams between the engine and its collaborators:
//!
//! - [`BoardClient`]: abstract read capability over the upstream API
//! - [`DedupStore`]: persistent "already seen" identifier tracking
//! - [`Notifier`] / [`ErrorSink`]: outbound event and error delivery

pub mod client;
pub mod dedup;
pub mod notify;

pub use client::BoardClient;
pub use dedup::{DedupStore, namespace};
pub use notify::{ChannelNotifier, ErrorSink, Notifier};
