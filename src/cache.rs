//! Memoization Module
//! Keeps derived tables keyed by their source and parameters until cleared.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

/// A `(source, parameters) -> value` memo. Values are shared read-only as
/// `Arc`; nothing is evicted until [`Memo::clear`].
pub struct Memo<K, V> {
    entries: Mutex<HashMap<K, Arc<V>>>,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V> Memo<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<K, Arc<V>>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries().get(key).cloned()
    }

    /// Return the stored value or compute, store and return it. A failed
    /// computation stores nothing. The lock is not held while computing, so
    /// two racing callers may both compute; the first stored value wins.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = Arc::new(compute()?);
        Ok(self
            .entries()
            .entry(key.clone())
            .or_insert(value)
            .clone())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Every stored entry, in no particular order.
    pub fn snapshot(&self) -> Vec<(K, Arc<V>)> {
        self.entries()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Drop every entry. Values already handed out stay valid.
    pub fn clear(&self) {
        self.entries().clear();
    }
}
