// # Memory Dedup Store
//
// In-memory implementation of DedupStore.
//
// ## Crash behavior
//
// All seen state is lost on restart. The first poll after a restart re-seeds
// silently (cold start), so no history replays, but identifiers that
// appeared *during* downtime are seeded rather than emitted. Use the SQLite
// store when that matters.
//
// ## When to use
//
// - Tests
// - Deployments where missing-across-restart notifications are acceptable

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::dedup::DedupStore;

#[derive(Debug, Clone, Copy)]
struct Slot {
    seen_at: i64,
    /// Insertion sequence; recency ordering with sub-second resolution,
    /// which `seen_at` (whole epoch seconds) cannot provide
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    scopes: HashMap<(String, String), HashMap<String, Slot>>,
    next_seq: u64,
}

impl Inner {
    fn slot(&mut self) -> Slot {
        let slot = Slot {
            seen_at: chrono::Utc::now().timestamp(),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        slot
    }
}

/// In-memory dedup store implementation
#[derive(Debug, Clone, Default)]
pub struct MemoryDedupStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn scope_key(namespace: &str, key: &str) -> (String, String) {
    (namespace.to_string(), key.to_string())
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn has(&self, namespace: &str, key: &str, event_id: &str) -> Result<bool, Error> {
        let inner = self.inner.read().await;
        Ok(inner
            .scopes
            .get(&scope_key(namespace, key))
            .is_some_and(|ids| ids.contains_key(event_id)))
    }

    async fn add(&self, namespace: &str, key: &str, event_id: &str) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        let slot = inner.slot();
        inner
            .scopes
            .entry(scope_key(namespace, key))
            .or_default()
            .entry(event_id.to_string())
            .or_insert(slot);
        Ok(())
    }

    async fn add_if_new(&self, namespace: &str, key: &str, event_id: &str) -> Result<bool, Error> {
        let mut inner = self.inner.write().await;
        let slot = inner.slot();
        let ids = inner.scopes.entry(scope_key(namespace, key)).or_default();
        if ids.contains_key(event_id) {
            return Ok(false);
        }
        ids.insert(event_id.to_string(), slot);
        Ok(true)
    }

    async fn filter_new(
        &self,
        namespace: &str,
        key: &str,
        event_ids: &[String],
    ) -> Result<Vec<String>, Error> {
        let inner = self.inner.read().await;
        let seen = inner.scopes.get(&scope_key(namespace, key));
        Ok(event_ids
            .iter()
            .filter(|id| !seen.is_some_and(|ids| ids.contains_key(id.as_str())))
            .cloned()
            .collect())
    }

    async fn add_many(
        &self,
        namespace: &str,
        key: &str,
        event_ids: &[String],
    ) -> Result<usize, Error> {
        let mut inner = self.inner.write().await;
        let mut inserted = 0;
        for id in event_ids {
            let slot = inner.slot();
            let ids = inner.scopes.entry(scope_key(namespace, key)).or_default();
            if !ids.contains_key(id) {
                ids.insert(id.clone(), slot);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn prune(&self, namespace: &str, key: &str, keep: usize) -> Result<usize, Error> {
        let mut inner = self.inner.write().await;
        let Some(ids) = inner.scopes.get_mut(&scope_key(namespace, key)) else {
            return Ok(0);
        };
        if ids.len() <= keep {
            return Ok(0);
        }

        let mut by_recency: Vec<(String, u64)> =
            ids.iter().map(|(id, slot)| (id.clone(), slot.seq)).collect();
        by_recency.sort_by_key(|(_, seq)| std::cmp::Reverse(*seq));

        let deleted = by_recency.len() - keep;
        for (id, _) in by_recency.into_iter().skip(keep) {
            ids.remove(&id);
        }
        Ok(deleted)
    }

    async fn purge_older_than(&self, age: Duration) -> Result<usize, Error> {
        let cutoff = chrono::Utc::now().timestamp() - age.as_secs() as i64;
        let mut inner = self.inner.write().await;
        let mut deleted = 0;
        for ids in inner.scopes.values_mut() {
            let before = ids.len();
            ids.retain(|_, slot| slot.seen_at >= cutoff);
            deleted += before - ids.len();
        }
        inner.scopes.retain(|_, ids| !ids.is_empty());
        Ok(deleted)
    }

    async fn stats(&self) -> Result<HashMap<String, u64>, Error> {
        let inner = self.inner.read().await;
        let mut counts: HashMap<String, u64> = HashMap::new();
        for ((namespace, _), ids) in &inner.scopes {
            *counts.entry(namespace.clone()).or_default() += ids.len() as u64;
        }
        Ok(counts)
    }

    async fn clear(&self, namespace: Option<&str>, key: Option<&str>) -> Result<usize, Error> {
        if namespace.is_none() && key.is_some() {
            return Err(Error::invalid_input("clear: key requires a namespace"));
        }
        let mut inner = self.inner.write().await;
        let mut deleted = 0;
        inner.scopes.retain(|(ns, k), ids| {
            let matches = match (namespace, key) {
                (None, _) => true,
                (Some(target_ns), None) => ns == target_ns,
                (Some(target_ns), Some(target_key)) => ns == target_ns && k == target_key,
            };
            if matches {
                deleted += ids.len();
                false
            } else {
                true
            }
        });
        Ok(deleted)
    }
}
