//! Shared cache for population statistics.
//!
//! Warm reads take a shared read lock and clone an [`Arc`]. A miss is
//! computed with no lock held and then inserted under the write lock; if
//! two threads miss on the same key at once both compute, and the first
//! insert wins. Every statistic is a pure function of the population, so
//! the duplicate work is harmless.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::Result;

/// A keyed, clearable store of computed statistics.
#[derive(Debug)]
pub struct StatsCache<K, V> {
    entries: RwLock<HashMap<K, Arc<V>>>,
}

impl<K: Eq + Hash + Clone, V> StatsCache<K, V> {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The cached value, if any.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries.read().get(key).cloned()
    }

    /// The cached value, computing and storing it on a miss.
    ///
    /// Failures are returned and not cached.
    ///
    /// # Errors
    ///
    /// Propagates the error from `compute`.
    pub fn get_or_try_insert(&self, key: &K, compute: impl FnOnce() -> Result<V>) -> Result<Arc<V>> {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let value = Arc::new(compute()?);
        let mut entries = self.entries.write();
        Ok(Arc::clone(
            entries.entry(key.clone()).or_insert(value),
        ))
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<K: Eq + Hash + Clone, V> Default for StatsCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::types::ProfileError;

    #[test]
    fn computes_once_when_warm() {
        let cache: StatsCache<u8, f64> = StatsCache::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let v = cache
                .get_or_try_insert(&1, || {
                    calls.fetch_add(1, Ordering::Relaxed);
                    Ok(2.5)
                })
                .unwrap();
            assert!((*v - 2.5).abs() < 1e-10);
        }
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn errors_are_not_cached() {
        let cache: StatsCache<u8, f64> = StatsCache::new();
        assert!(
            cache
                .get_or_try_insert(&1, || Err(ProfileError::EmptyPopulation))
                .is_err()
        );
        assert!(cache.is_empty());
        cache.get_or_try_insert(&1, || Ok(1.0)).unwrap();
        assert!(cache.get(&1).is_some());
    }

    #[test]
    fn clear_empties() {
        let cache: StatsCache<u8, u8> = StatsCache::default();
        cache.get_or_try_insert(&1, || Ok(1)).unwrap();
        cache.clear();
        assert!(cache.get(&1).is_none());
    }

    #[test]
    fn concurrent_readers_agree() {
        let cache: StatsCache<u8, u64> = StatsCache::new();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let v = cache.get_or_try_insert(&7, || Ok(49)).unwrap();
                    assert_eq!(*v, 49);
                });
            }
        });
        assert_eq!(cache.len(), 1);
    }
}
