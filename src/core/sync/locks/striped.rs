/*!
 * Lock Striping Pattern
 * Reduces contention by partitioning keys across independently locked stripes
 */

use crate::core::errors::{SyncError, SyncResult};
use ahash::RandomState;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Stripe counts must be non-zero powers of 2 (index by mask)
pub(crate) fn check_stripe_count(stripe_count: usize) -> SyncResult<()> {
    if stripe_count == 0 || !stripe_count.is_power_of_two() {
        return Err(SyncError::InvalidConfig(format!(
            "Stripe count must be a power of 2, got {}",
            stripe_count
        )));
    }
    Ok(())
}

/// Lock-striped hash map of immutable value snapshots
///
/// Values are stored as `Arc<V>` and replaced whole, so a reader holding a
/// snapshot can never observe a half-written value.
///
/// # Performance
///
/// - **Contention reduction**: N-way striping reduces lock contention by ~N
/// - **Readers share**: `RwLock` stripes let same-stripe reads run in parallel
/// - **Typical stripe count**: 16-64 (balance between memory and contention)
pub struct StripedMap<K, V> {
    stripes: Box<[RwLock<HashMap<K, Arc<V>>>]>,
    stripe_mask: usize,
    hasher: RandomState,
}

impl<K: Hash + Eq, V> StripedMap<K, V> {
    /// Create new striped map with specified stripe count
    ///
    /// # Panics
    ///
    /// Panics if `stripe_count` is not a non-zero power of 2
    pub fn new(stripe_count: usize) -> Self {
        match Self::try_new(stripe_count) {
            Ok(map) => map,
            Err(e) => panic!("{}", e),
        }
    }

    /// Fallible constructor for configuration-driven stripe counts
    pub fn try_new(stripe_count: usize) -> SyncResult<Self> {
        check_stripe_count(stripe_count)?;

        let stripes = (0..stripe_count)
            .map(|_| RwLock::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            stripes,
            stripe_mask: stripe_count - 1,
            hasher: RandomState::new(),
        })
    }

    #[inline]
    fn stripe(&self, key: &K) -> &RwLock<HashMap<K, Arc<V>>> {
        let idx = (self.hasher.hash_one(key) as usize) & self.stripe_mask;
        &self.stripes[idx]
    }

    /// Upsert, returning the replaced snapshot
    pub fn insert(&self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        self.stripe(&key).write().insert(key, value)
    }

    /// Clone out the current snapshot (read lock only)
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.stripe(key).read().get(key).cloned()
    }

    /// Atomic read-modify-write of one key
    ///
    /// `f` sees the current snapshot (if any) and returns the replacement;
    /// `None` removes the key. The stripe stays write-locked throughout, so
    /// no other writer to this key can interleave.
    pub fn compute<F>(&self, key: K, f: F) -> Option<Arc<V>>
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let mut stripe = self.stripe(&key).write();
        match f(stripe.get(&key).map(|v| v.as_ref())) {
            Some(next) => {
                let next = Arc::new(next);
                stripe.insert(key, next.clone());
                Some(next)
            }
            None => {
                stripe.remove(&key);
                None
            }
        }
    }

    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.stripe(key).write().remove(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.stripe(key).read().contains_key(key)
    }

    /// Total entries across all stripes (not a consistent snapshot)
    pub fn len(&self) -> usize {
        self.stripes.iter().map(|stripe| stripe.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stripes.iter().all(|stripe| stripe.read().is_empty())
    }

    pub fn clear(&self) {
        for stripe in self.stripes.iter() {
            stripe.write().clear();
        }
    }

    /// Visit every entry, one stripe read lock at a time
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for stripe in self.stripes.iter() {
            let guard = stripe.read();
            for (k, v) in guard.iter() {
                f(k, v);
            }
        }
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }
}
