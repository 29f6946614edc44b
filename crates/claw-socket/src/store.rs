//! Bounded, insertion-ordered store of subscription requests.
//!
//! Entries are kept in the order they were first added and replayed in that
//! order after a reconnect. When the store is full the oldest entry is
//! evicted to make room.

use std::collections::{HashSet, VecDeque};

/// Default bound on stored subscription requests.
pub const DEFAULT_MAX_STORED_REQUESTS: usize = 100;

/// Ordered set of subscription payloads with FIFO eviction.
#[derive(Debug, Clone)]
pub struct SubscriptionStore {
    order: VecDeque<String>,
    members: HashSet<String>,
    max_size: usize,
}

impl Default for SubscriptionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STORED_REQUESTS)
    }
}

impl SubscriptionStore {
    /// Create an empty store holding at most `max_size` entries.
    ///
    /// A bound of zero is raised to one.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            order: VecDeque::with_capacity(max_size.min(1024)),
            members: HashSet::new(),
            max_size,
        }
    }

    /// Maximum number of entries.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether `key` is stored.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.members.contains(key)
    }

    /// Insert `key`, evicting the oldest entry if the store is full.
    ///
    /// Re-adding a stored key leaves its position unchanged. Returns the
    /// evicted key, if any.
    pub fn add(&mut self, key: impl Into<String>) -> Option<String> {
        let key = key.into();
        if self.members.contains(&key) {
            return None;
        }

        let evicted = if self.order.len() >= self.max_size {
            self.order.pop_front().inspect(|oldest| {
                self.members.remove(oldest);
            })
        } else {
            None
        };

        self.members.insert(key.clone());
        self.order.push_back(key);
        evicted
    }

    /// Remove `key` if present. Returns whether anything was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        if !self.members.remove(key) {
            return false;
        }
        self.order.retain(|stored| stored != key);
        true
    }

    /// Replace the whole contents, in the given order.
    ///
    /// Duplicates collapse onto their first occurrence; when more than
    /// `max_size` distinct keys are supplied the newest ones survive.
    pub fn replace<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clear();
        for key in keys {
            self.add(key);
        }
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    /// Copy of the entries in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }

    /// Iterate over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_add_and_snapshot_preserve_order() {
        let mut store = SubscriptionStore::new(10);
        store.add("a");
        store.add("b");
        store.add("c");
        assert_eq!(store.snapshot(), vec!["a", "b", "c"]);
        assert_eq!(store.len(), 3);
        assert!(store.contains("b"));
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut store = SubscriptionStore::new(5);
        let mut evicted = Vec::new();
        for i in 1..=7 {
            if let Some(old) = store.add(format!("key-{i}")) {
                evicted.push(old);
            }
        }

        assert_eq!(store.len(), 5);
        assert_eq!(evicted, vec!["key-1", "key-2"]);
        assert_eq!(
            store.snapshot(),
            vec!["key-3", "key-4", "key-5", "key-6", "key-7"]
        );
    }

    #[test]
    fn test_readd_keeps_position() {
        let mut store = SubscriptionStore::new(3);
        store.add("a");
        store.add("b");
        assert!(store.add("a").is_none());
        assert_eq!(store.snapshot(), vec!["a", "b"]);

        store.add("c");
        store.add("d");
        assert_eq!(store.snapshot(), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_remove_then_evict_skips_removed() {
        let mut store = SubscriptionStore::new(3);
        store.add("a");
        store.add("b");
        store.add("c");
        assert!(store.remove("a"));
        assert!(!store.remove("a"));

        store.add("d");
        assert!(store.add("e").is_some());
        assert_eq!(store.snapshot(), vec!["c", "d", "e"]);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut store = SubscriptionStore::new(3);
        store.add("a");
        let mut copy = store.snapshot();
        copy.push("injected".to_string());
        copy.clear();
        assert_eq!(store.snapshot(), vec!["a"]);
    }

    #[test]
    fn test_replace_collapses_and_bounds() {
        let mut store = SubscriptionStore::new(2);
        store.add("old");
        store.replace(["x", "y", "x", "z"]);
        assert_eq!(store.snapshot(), vec!["y", "z"]);
        assert!(!store.contains("old"));
    }

    #[test]
    fn test_clear() {
        let mut store = SubscriptionStore::new(4);
        store.add("a");
        store.add("b");
        store.clear();
        assert!(store.is_empty());
        assert!(!store.contains("a"));
    }

    #[test]
    fn test_zero_bound_is_raised() {
        let mut store = SubscriptionStore::new(0);
        assert_eq!(store.max_size(), 1);
        store.add("a");
        store.add("b");
        assert_eq!(store.snapshot(), vec!["b"]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u8),
        Remove(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0u8..20).prop_map(Op::Add),
            1 => (0u8..20).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn prop_store_matches_fifo_model(
            max_size in 1usize..8,
            ops in proptest::collection::vec(op_strategy(), 0..64),
        ) {
            let mut store = SubscriptionStore::new(max_size);
            let mut model: Vec<String> = Vec::new();

            for op in ops {
                match op {
                    Op::Add(k) => {
                        let key = format!("k{k}");
                        store.add(key.clone());
                        if !model.contains(&key) {
                            if model.len() == max_size {
                                model.remove(0);
                            }
                            model.push(key);
                        }
                    }
                    Op::Remove(k) => {
                        let key = format!("k{k}");
                        store.remove(&key);
                        model.retain(|m| m != &key);
                    }
                }

                prop_assert!(store.len() <= max_size);
                prop_assert_eq!(store.snapshot(), model.clone());
            }
        }
    }
}
