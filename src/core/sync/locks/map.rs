/*!
 * Concurrent Map
 *
 * Thread-safe key/value store of immutable value snapshots.
 *
 * # Design: Enum Dispatch Over Backends
 *
 * Like the wait strategies, backends are selected once at construction and
 * dispatched through an enum instead of `Box<dyn Trait>`:
 * - `Striped`: fixed array of RwLock stripes (zero allocation after init)
 * - `Sharded`: DashMap shards (better for write-heavy workloads)
 *
 * Both give the same guarantees:
 * - a `get` never observes a partially written value
 * - operations on keys in different shards never block each other
 * - same-key writes are serialized; the last `put` to complete wins
 * - a `put` is visible to a following `get` on the same thread
 */

use super::striped::{check_stripe_count, StripedMap};
use crate::core::errors::SyncResult;
use crate::core::sync::{MapStrategy, SyncConfig};
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

enum MapImpl<K, V>
where
    K: Hash + Eq,
{
    Striped(StripedMap<K, V>),
    Sharded(DashMap<K, Arc<V>, RandomState>),
}

/// Thread-safe map with snapshot values
///
/// # Example
///
/// ```
/// use ai_os_sync::ConcurrentMap;
///
/// let map = ConcurrentMap::new();
/// map.put("A", 10);
/// assert_eq!(map.get(&"A"), Some(10));
/// assert_eq!(map.get_or_default(&"B", 0), 0);
/// ```
pub struct ConcurrentMap<K, V>
where
    K: Hash + Eq,
{
    inner: MapImpl<K, V>,
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Hash + Eq,
{
    /// Create with the process-wide configuration
    pub fn new() -> Self {
        Self::with_config(&crate::core::sync::global_config())
    }

    /// Create from a configuration
    ///
    /// # Panics
    ///
    /// Panics if the configured stripe count is invalid; use
    /// `try_with_strategy` to handle that as an error.
    pub fn with_config(config: &SyncConfig) -> Self {
        Self::with_strategy(config.map_strategy, config.stripe_count)
    }

    /// Create with an explicit backend and shard count
    ///
    /// # Panics
    ///
    /// Panics if `shards` is not a non-zero power of 2
    pub fn with_strategy(strategy: MapStrategy, shards: usize) -> Self {
        match Self::try_with_strategy(strategy, shards) {
            Ok(map) => map,
            Err(e) => panic!("{}", e),
        }
    }

    /// Fallible constructor
    pub fn try_with_strategy(strategy: MapStrategy, shards: usize) -> SyncResult<Self> {
        let inner = match strategy {
            MapStrategy::Striped => MapImpl::Striped(StripedMap::try_new(shards)?),
            MapStrategy::Sharded => {
                check_stripe_count(shards)?;
                // DashMap requires more than one shard
                MapImpl::Sharded(DashMap::with_hasher_and_shard_amount(
                    RandomState::new(),
                    shards.max(2),
                ))
            }
        };
        debug!(?strategy, shards, "Concurrent map created");
        Ok(Self { inner })
    }

    /// Backend in use
    pub fn strategy(&self) -> MapStrategy {
        match &self.inner {
            MapImpl::Striped(_) => MapStrategy::Striped,
            MapImpl::Sharded(_) => MapStrategy::Sharded,
        }
    }

    /// Upsert; returns the snapshot that was replaced
    #[inline]
    pub fn put(&self, key: K, value: V) -> Option<Arc<V>> {
        let value = Arc::new(value);
        match &self.inner {
            MapImpl::Striped(m) => m.insert(key, value),
            MapImpl::Sharded(m) => m.insert(key, value),
        }
    }

    /// Current snapshot without cloning the value
    #[inline]
    pub fn snapshot(&self, key: &K) -> Option<Arc<V>> {
        match &self.inner {
            MapImpl::Striped(m) => m.get(key),
            MapImpl::Sharded(m) => m.get(key).map(|entry| Arc::clone(entry.value())),
        }
    }

    /// Current value, `None` when absent
    #[inline]
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.snapshot(key).map(|v| V::clone(&v))
    }

    /// Current value, or `default` when absent
    #[inline]
    pub fn get_or_default(&self, key: &K, default: V) -> V
    where
        V: Clone,
    {
        self.get(key).unwrap_or(default)
    }

    /// Atomic per-key read-modify-write
    ///
    /// `f` receives the current value and returns the replacement; returning
    /// `None` removes the key. Returns the value stored afterwards.
    pub fn compute<F>(&self, key: K, f: F) -> Option<Arc<V>>
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        match &self.inner {
            MapImpl::Striped(m) => m.compute(key, f),
            MapImpl::Sharded(m) => match m.entry(key) {
                Entry::Occupied(mut occupied) => match f(Some(occupied.get().as_ref())) {
                    Some(next) => {
                        let next = Arc::new(next);
                        occupied.insert(Arc::clone(&next));
                        Some(next)
                    }
                    None => {
                        occupied.remove();
                        None
                    }
                },
                Entry::Vacant(vacant) => f(None).map(|next| {
                    let next = Arc::new(next);
                    vacant.insert(Arc::clone(&next));
                    next
                }),
            },
        }
    }

    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        match &self.inner {
            MapImpl::Striped(m) => m.remove(key),
            MapImpl::Sharded(m) => m.remove(key).map(|(_, v)| v),
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        match &self.inner {
            MapImpl::Striped(m) => m.contains_key(key),
            MapImpl::Sharded(m) => m.contains_key(key),
        }
    }

    /// Entry count (not a consistent snapshot under concurrent writes)
    pub fn len(&self) -> usize {
        match &self.inner {
            MapImpl::Striped(m) => m.len(),
            MapImpl::Sharded(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.inner {
            MapImpl::Striped(m) => m.is_empty(),
            MapImpl::Sharded(m) => m.is_empty(),
        }
    }

    pub fn clear(&self) {
        match &self.inner {
            MapImpl::Striped(m) => m.clear(),
            MapImpl::Sharded(m) => m.clear(),
        }
    }

    /// Visit every entry; holds one shard lock at a time
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        match &self.inner {
            MapImpl::Striped(m) => m.for_each(f),
            MapImpl::Sharded(m) => {
                for entry in m.iter() {
                    f(entry.key(), entry.value().as_ref());
                }
            }
        }
    }
}

impl<K, V> Default for ConcurrentMap<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}
