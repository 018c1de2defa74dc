//! Process-wide rate-limit bookkeeping
//!
//! One upstream credential is shared by every watch job in the process, so
//! exhaustion observed by any one job has to pause all of them. The gate is
//! a single injected object with an explicit lifecycle: constructed once at
//! startup, passed by `Arc` to every job loop, no ambient globals.
//!
//! Monotonic [`tokio::time::Instant`] deadlines are used so paused-clock
//! tests can drive the cooldown deterministically.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// Default cooldown after an upstream rate-limit signal
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(600);

/// Shared per-credential rate-limit tracker.
///
/// All operations are atomic; the gate is safe for concurrent reads and
/// occasional writes from any job's loop.
#[derive(Debug)]
pub struct RateLimitGate {
    cooldown: Duration,
    limited_until: Mutex<HashMap<String, Instant>>,
}

impl RateLimitGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            limited_until: Mutex::new(HashMap::new()),
        }
    }

    // Deadlines are written in one assignment; a poisoned lock still holds
    // a consistent map, so recover the guard.
    fn map(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.limited_until.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether the credential is currently inside a cooldown window.
    pub fn is_limited(&self, credential: &str) -> bool {
        self.map()
            .get(credential)
            .is_some_and(|until| Instant::now() < *until)
    }

    /// Begin a cooldown window of the configured length.
    pub fn mark(&self, credential: &str) {
        self.mark_until(credential, Instant::now() + self.cooldown);
    }

    /// Begin a cooldown window ending at an explicit deadline (used when the
    /// upstream response carries its own retry-after hint).
    pub fn mark_until(&self, credential: &str, until: Instant) {
        self.map().insert(credential.to_string(), until);
        warn!(
            credential = redact(credential),
            cooldown_secs = (until - Instant::now()).as_secs(),
            "rate limit hit, pausing all watches on this credential"
        );
    }

    /// Time left in the credential's cooldown window, if any.
    pub fn remaining(&self, credential: &str) -> Option<Duration> {
        let until = *self.map().get(credential)?;
        let now = Instant::now();
        (now < until).then(|| until - now)
    }
}

impl Default for RateLimitGate {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

/// Keep only a short suffix of credential material in logs.
fn redact(credential: &str) -> String {
    let tail: String = credential
        .chars()
        .rev()
        .take(6)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn cooldown_expires_after_window() {
        let gate = RateLimitGate::new(Duration::from_secs(600));
        assert!(!gate.is_limited("tok"));

        gate.mark("tok");
        assert!(gate.is_limited("tok"));
        assert!(gate.remaining("tok").unwrap() > Duration::from_secs(590));

        tokio::time::advance(Duration::from_secs(601)).await;
        assert!(!gate.is_limited("tok"));
        assert_eq!(gate.remaining("tok"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn credentials_are_independent() {
        let gate = RateLimitGate::default();
        gate.mark("a");
        assert!(gate.is_limited("a"));
        assert!(!gate.is_limited("b"));
    }

    #[test]
    fn poisoned_lock_recovers() {
        let gate = std::sync::Arc::new(RateLimitGate::default());
        gate.mark("tok");

        let holder = std::sync::Arc::clone(&gate);
        let _ = std::thread::spawn(move || {
            let _guard = holder.limited_until.lock().unwrap();
            panic!("holder dies while locked");
        })
        .join();

        assert!(gate.is_limited("tok"));
    }

    #[test]
    fn redact_keeps_suffix_only() {
        assert_eq!(redact("abcdefghij"), "...efghij");
        assert_eq!(redact("xy"), "...xy");
    }
}
