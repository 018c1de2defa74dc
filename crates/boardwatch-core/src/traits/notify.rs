// # Notifier and Error Sink Traits
//
// Outbound delivery seams. The engine guarantees at-most-once emission per
// identifier; what happens to an event after that (Telegram, webhook,
// stdout) is the implementation's business.

use async_trait::async_trait;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::error::{Error, Result};
use crate::model::{Event, WatchKind};

/// Trait for notification delivery
///
/// Invoked with one [`Event`] per detected change, in creation-time order
/// within a poll cycle. A returned error is logged and forwarded to the
/// [`ErrorSink`]; it never causes re-emission (the id was marked seen before
/// the callback) and never stops the job.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one event.
    async fn notify(&self, event: Event) -> Result<()>;
}

/// Trait for per-job error reporting
///
/// Receives every error a watch iteration produced, tagged with the job
/// kind. Implementations must not panic; the supervisor calls this from
/// every job task.
#[async_trait]
pub trait ErrorSink: Send + Sync {
    /// Report one iteration error.
    async fn on_error(&self, kind: WatchKind, error: &Error);
}

/// A [`Notifier`] that forwards events into a bounded channel.
///
/// The receiving half is exposed as a stream, which is usually the most
/// convenient way to consume the watcher from application code:
///
/// ```rust,no_run
/// use boardwatch_core::traits::ChannelNotifier;
/// use tokio_stream::StreamExt;
///
/// # async fn demo() {
/// let (notifier, mut events) = ChannelNotifier::channel(256);
/// // hand `notifier` to the watcher, then:
/// while let Some(event) = events.next().await {
///     println!("{event:?}");
/// }
/// # }
/// ```
pub struct ChannelNotifier {
    tx: mpsc::Sender<Event>,
}

impl ChannelNotifier {
    /// Create a notifier and the stream of events it will deliver.
    pub fn channel(capacity: usize) -> (Self, ReceiverStream<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, ReceiverStream::new(rx))
    }

    /// Wrap an existing sender.
    pub fn from_sender(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, event: Event) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| Error::Other("event channel closed".to_string()))
    }
}

/// An [`ErrorSink`] that only logs, for deployments that don't need
/// programmatic error routing.
pub struct LogErrorSink;

#[async_trait]
impl ErrorSink for LogErrorSink {
    async fn on_error(&self, kind: WatchKind, error: &Error) {
        warn!(watch = %kind, %error, "watch iteration failed");
    }
}

/// Boxed event stream type, for callers that need to store one.
pub type EventStream = Pin<Box<dyn Stream<Item = Event> + Send + 'static>>;
