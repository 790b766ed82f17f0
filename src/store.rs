//! Process-local record store owned by the server state.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

/// Thread-safe keyed store; clones share the same records.
#[derive(Debug)]
pub struct MemoryStore<K, V>
where
    K: Eq + Hash,
{
    inner: Arc<DashMap<K, V>>,
}

impl<K: Eq + Hash, V> Clone for MemoryStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: Eq + Hash, V> Default for MemoryStore<K, V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }
}

impl<K, V> MemoryStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    /// Insert or replace; returns the previous value.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.inner.insert(key, value)
    }

    /// Insert only when `key` is absent; returns false if it was taken.
    pub fn insert_new(&self, key: K, value: V) -> bool {
        match self.inner.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.remove(key).map(|(_, v)| v)
    }

    pub fn values(&self) -> Vec<V> {
        self.inner.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_records() {
        let store: MemoryStore<String, u32> = MemoryStore::new();
        let other = store.clone();

        assert!(store.insert_new("bob".into(), 42));
        assert!(!other.insert_new("bob".into(), 7));
        assert_eq!(other.get(&"bob".to_string()), Some(42));

        assert_eq!(other.insert("bob".into(), 43), Some(42));
        assert_eq!(store.remove(&"bob".to_string()), Some(43));
        assert!(store.is_empty());
    }
}
