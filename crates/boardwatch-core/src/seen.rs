//! Bounded insertion-ordered seen-set
//!
//! Watch jobs need an in-memory "already seen" set that cannot grow without
//! bound. Trimming a plain hash set would evict arbitrary entries; this
//! structure remembers insertion order explicitly and always evicts the
//! oldest ids first, so trimming deterministically keeps the most recent
//! `trim_to` entries.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

use crate::config::SeenBounds;

/// Insertion-ordered set with a cap and a trim target.
///
/// When an insert pushes the length past `cap`, the oldest entries are
/// evicted until `trim_to` remain.
#[derive(Debug)]
pub struct BoundedSeen<T> {
    bounds: SeenBounds,
    order: VecDeque<T>,
    set: HashSet<T>,
    trimmed: bool,
}

impl<T: Eq + Hash + Clone> BoundedSeen<T> {
    pub fn new(bounds: SeenBounds) -> Self {
        Self {
            bounds,
            order: VecDeque::new(),
            set: HashSet::new(),
            trimmed: false,
        }
    }

    /// Insert an id. Returns `true` if it was not present before.
    pub fn insert(&mut self, id: T) -> bool {
        if !self.set.insert(id.clone()) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.bounds.cap {
            self.trim();
        }
        true
    }

    /// Whether the id is currently tracked. Evicted ids read as unseen;
    /// the persistent dedup store is what backs the long tail.
    pub fn contains(&self, id: &T) -> bool {
        self.set.contains(id)
    }

    /// Extend from a snapshot (cold-start seeding).
    pub fn extend(&mut self, ids: impl IntoIterator<Item = T>) {
        for id in ids {
            self.insert(id);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether a trim happened since the last call. Jobs use this to decide
    /// when the persistent store's matching scope is worth pruning too.
    pub fn take_trimmed(&mut self) -> bool {
        std::mem::take(&mut self.trimmed)
    }

    pub fn bounds(&self) -> SeenBounds {
        self.bounds
    }

    fn trim(&mut self) {
        while self.order.len() > self.bounds.trim_to {
            if let Some(old) = self.order.pop_front() {
                self.set.remove(&old);
            }
        }
        self.trimmed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(cap: usize, trim_to: usize) -> SeenBounds {
        SeenBounds { cap, trim_to }
    }

    #[test]
    fn insert_reports_novelty() {
        let mut seen = BoundedSeen::new(bounds(10, 5));
        assert!(seen.insert(1u64));
        assert!(!seen.insert(1u64));
        assert!(seen.contains(&1));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn overflow_evicts_oldest_down_to_trim_target() {
        let mut seen = BoundedSeen::new(bounds(4, 2));
        for id in 1u64..=5 {
            seen.insert(id);
        }
        // Inserting 5 exceeded cap 4: trimmed to the 2 most recent.
        assert_eq!(seen.len(), 2);
        assert!(!seen.contains(&1));
        assert!(!seen.contains(&2));
        assert!(!seen.contains(&3));
        assert!(seen.contains(&4));
        assert!(seen.contains(&5));
    }

    #[test]
    fn trim_flag_is_set_once_per_trim() {
        let mut seen = BoundedSeen::new(bounds(2, 1));
        assert!(!seen.take_trimmed());
        seen.insert(1u64);
        seen.insert(2u64);
        seen.insert(3u64);
        assert!(seen.take_trimmed());
        assert!(!seen.take_trimmed());
    }

    #[test]
    fn works_with_string_ids() {
        let mut seen: BoundedSeen<String> = BoundedSeen::new(bounds(3, 1));
        seen.extend(["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(seen.len(), 3);
        seen.insert("d".to_string());
        assert_eq!(seen.len(), 1);
        assert!(seen.contains(&"d".to_string()));
    }
}
