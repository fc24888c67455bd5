//! Observable state store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::debug;

/// Owner of one feature instance's domain state.
///
/// Every version of the state is an immutable `Arc<S>`. New versions are
/// produced by [`update`](Self::update) or [`replace`](Self::replace) and are
/// published to subscribers synchronously, so [`snapshot`](Self::snapshot)
/// always returns the latest value, including from inside an in-flight
/// mutation.
///
/// Once [`retire`](Self::retire) has been called (the owning feature was torn
/// down), further writes are silently dropped.
pub struct StateStore<S> {
    inner: Arc<StoreInner<S>>,
}

struct StoreInner<S> {
    tx: watch::Sender<Arc<S>>,
    alive: AtomicBool,
}

impl<S> Clone for StateStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Default> Default for StateStore<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S> StateStore<S> {
    /// Create a live store holding `initial`.
    pub fn new(initial: S) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self {
            inner: Arc::new(StoreInner {
                tx,
                alive: AtomicBool::new(true),
            }),
        }
    }

    /// The current state.
    #[must_use]
    pub fn snapshot(&self) -> Arc<S> {
        Arc::clone(&self.inner.tx.borrow())
    }

    /// Subscribe to every new version of the state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<S>> {
        self.inner.tx.subscribe()
    }

    /// Produce a new version from the current one.
    ///
    /// `f` runs while the store is locked and must not call back into it.
    /// Returns `false` if the store has been retired.
    pub fn update(&self, f: impl FnOnce(&S) -> S) -> bool {
        let alive = &self.inner.alive;
        self.inner.tx.send_if_modified(|current| {
            if !alive.load(Ordering::Acquire) {
                debug!("Dropping state update after teardown");
                return false;
            }
            *current = Arc::new(f(&**current));
            true
        })
    }

    /// Replace the state wholesale.
    ///
    /// Returns `false` if the store has been retired.
    pub fn replace(&self, value: S) -> bool {
        self.update(|_| value)
    }

    /// Mark the owning feature as torn down.
    pub fn retire(&self) {
        self.inner.alive.store(false, Ordering::Release);
    }

    /// Whether the owning feature is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::Acquire)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_update_is_visible_in_snapshot() {
        let store = StateStore::new(vec![1, 2]);
        assert!(store.update(|v| {
            let mut next = v.clone();
            next.push(3);
            next
        }));
        assert_eq!(*store.snapshot(), vec![1, 2, 3]);
    }

    #[test]
    fn test_old_snapshots_are_immutable() {
        let store = StateStore::new(1_u32);
        let before = store.snapshot();
        store.update(|n| n + 1);
        assert_eq!(*before, 1);
        assert_eq!(*store.snapshot(), 2);
    }

    #[test]
    fn test_retired_store_ignores_writes() {
        let store = StateStore::new(String::from("a"));
        store.retire();
        assert!(!store.is_alive());
        assert!(!store.update(|_| String::from("b")));
        assert!(!store.replace(String::from("c")));
        assert_eq!(*store.snapshot(), "a");
    }

    #[tokio::test]
    async fn test_subscribers_are_notified() {
        let store = StateStore::new(0_u32);
        let mut rx = store.subscribe();

        store.replace(5);
        rx.changed().await.unwrap();
        assert_eq!(**rx.borrow_and_update(), 5);
    }

    #[tokio::test]
    async fn test_retired_store_does_not_notify() {
        let store = StateStore::new(0_u32);
        let mut rx = store.subscribe();
        store.retire();
        store.replace(9);
        assert!(!rx.has_changed().unwrap());
    }
}
