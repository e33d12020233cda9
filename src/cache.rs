//! Bounded cache for documents read by the file-backed loaders.
//!
//! Lookups are keyed by canonical URI, which under convention routing comes straight from the
//! request path. Entries (including "no document here" answers) are therefore kept in an LRU
//! of fixed capacity rather than an unbounded map.

use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Entries kept per loader unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct DocumentCache<K: Hash + Eq, V> {
    // LruCache::get needs &mut to update recency
    entries: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq, V: Clone> DocumentCache<K, V> {
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<K, V>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached value for `key`, or the result of `load`, which is stored on success.
    ///
    /// `load` runs without the lock held; two concurrent misses may both read the file.
    pub fn get_or_load<F>(&self, key: K, load: F) -> anyhow::Result<V>
    where
        F: FnOnce() -> anyhow::Result<V>,
    {
        if let Some(hit) = self.lock().get(&key) {
            return Ok(hit.clone());
        }
        let value = load()?;
        self.lock().put(key, value.clone());
        Ok(value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl<K: Hash + Eq, V: Clone> Default for DocumentCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
