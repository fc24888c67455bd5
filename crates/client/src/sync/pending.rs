//! Pending-operation tracker.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Set of keys whose mutation has been applied locally but not yet settled.
///
/// Membership can only be changed by the executor, through a claim that is
/// released when the claim is dropped. That makes the invariant hold on every
/// exit path, including a caller dropping the in-flight future.
pub struct PendingKeys<K> {
    keys: Arc<Mutex<HashSet<K>>>,
}

impl<K> Clone for PendingKeys<K> {
    fn clone(&self) -> Self {
        Self {
            keys: Arc::clone(&self.keys),
        }
    }
}

impl<K: Eq + Hash> Default for PendingKeys<K> {
    fn default() -> Self {
        Self {
            keys: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl<K: Eq + Hash> PendingKeys<K> {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a mutation for `key` is in flight.
    #[must_use]
    pub fn is_pending(&self, key: &K) -> bool {
        self.lock().contains(key)
    }

    /// Number of keys in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Mark `key` as pending unless it already is.
    ///
    /// Returns `None` when another mutation holds the key.
    pub(crate) fn try_claim(&self, key: K) -> Option<PendingClaim<K>>
    where
        K: Clone,
    {
        if !self.lock().insert(key.clone()) {
            return None;
        }
        Some(PendingClaim {
            keys: Arc::clone(&self.keys),
            key,
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<K>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Membership of one key; removes the key when dropped.
pub(crate) struct PendingClaim<K: Eq + Hash> {
    keys: Arc<Mutex<HashSet<K>>>,
    key: K,
}

impl<K: Eq + Hash> Drop for PendingClaim<K> {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_marks_pending_until_dropped() {
        let pending = PendingKeys::new();
        let claim = pending.try_claim("shop-1");
        assert!(claim.is_some());
        assert!(pending.is_pending(&"shop-1"));
        assert_eq!(pending.len(), 1);

        drop(claim);
        assert!(!pending.is_pending(&"shop-1"));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_second_claim_for_same_key_is_refused() {
        let pending = PendingKeys::new();
        let _first = pending.try_claim("shop-1");
        assert!(pending.try_claim("shop-1").is_none());
        // the refused claim must not release the first one
        assert!(pending.is_pending(&"shop-1"));
    }

    #[test]
    fn test_distinct_keys_are_independent() {
        let pending = PendingKeys::new();
        let first = pending.try_claim("r1");
        let second = pending.try_claim("r2");
        assert!(first.is_some() && second.is_some());

        drop(first);
        assert!(!pending.is_pending(&"r1"));
        assert!(pending.is_pending(&"r2"));
    }

    #[test]
    fn test_clones_share_membership() {
        let pending = PendingKeys::new();
        let view = pending.clone();
        let _claim = pending.try_claim(7_u32);
        assert!(view.is_pending(&7));
    }
}
