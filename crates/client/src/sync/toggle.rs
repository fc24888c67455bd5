//! Toggle operation factory.
//!
//! Favoriting and liking are each one symmetric operation with two halves.
//! A [`TogglePair`] binds both halves to the same executor so they share one
//! pending-key set: a pending "add" blocks a concurrent "remove" on the same
//! key, and vice versa.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use super::executor::{Mutation, MutationExecutor, MutationOutcome};
use crate::identity::AccessToken;

type StateFn<S, K> = Arc<dyn Fn(&S, &K) -> S + Send + Sync>;
type RemoteFn<K, E> =
    Arc<dyn Fn(K, Option<AccessToken>) -> BoxFuture<'static, Result<(), E>> + Send + Sync>;

/// One half of a toggle: how to apply it, how to undo it, and how to confirm it.
pub struct ToggleTemplate<S, K, E> {
    apply: StateFn<S, K>,
    revert: StateFn<S, K>,
    remote: RemoteFn<K, E>,
}

impl<S, K, E> Clone for ToggleTemplate<S, K, E> {
    fn clone(&self) -> Self {
        Self {
            apply: Arc::clone(&self.apply),
            revert: Arc::clone(&self.revert),
            remote: Arc::clone(&self.remote),
        }
    }
}

impl<S, K, E> ToggleTemplate<S, K, E> {
    /// Build a template from its optimistic, rollback and remote parts.
    pub fn new<A, V, C, Fut>(apply: A, revert: V, remote: C) -> Self
    where
        A: Fn(&S, &K) -> S + Send + Sync + 'static,
        V: Fn(&S, &K) -> S + Send + Sync + 'static,
        C: Fn(K, Option<AccessToken>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        Self {
            apply: Arc::new(apply),
            revert: Arc::new(revert),
            remote: Arc::new(move |key, token| remote(key, token).boxed()),
        }
    }
}

/// A template bound to an executor, callable with just a key.
pub struct ToggleOperation<S, K, E> {
    executor: MutationExecutor<S, K>,
    template: ToggleTemplate<S, K, E>,
}

impl<S, K, E> ToggleOperation<S, K, E>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    /// Bind `template` to `executor`.
    #[must_use]
    pub fn new(executor: MutationExecutor<S, K>, template: ToggleTemplate<S, K, E>) -> Self {
        Self { executor, template }
    }

    /// Run this half of the toggle for `key`.
    ///
    /// # Errors
    ///
    /// Returns the remote error after the executor has rolled back.
    pub async fn run(&self, key: K) -> Result<MutationOutcome, E> {
        let ToggleTemplate {
            apply,
            revert,
            remote,
        } = self.template.clone();

        let apply_key = key.clone();
        let remote_key = key.clone();
        let revert_key = key.clone();

        let mutation = Mutation::new(
            move |state: &S| apply(state, &apply_key),
            move |token| remote(remote_key, token),
            move |state: &S| revert(state, &revert_key),
        )
        .keyed(key);

        self.executor.execute(mutation).await
    }
}

/// Two toggle halves sharing one executor.
pub struct TogglePair<S, K, E> {
    on: ToggleOperation<S, K, E>,
    off: ToggleOperation<S, K, E>,
}

impl<S, K, E> TogglePair<S, K, E>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    /// Bind `on` and `off` to clones of the same executor.
    #[must_use]
    pub fn new(
        executor: &MutationExecutor<S, K>,
        on: ToggleTemplate<S, K, E>,
        off: ToggleTemplate<S, K, E>,
    ) -> Self {
        Self {
            on: ToggleOperation::new(executor.clone(), on),
            off: ToggleOperation::new(executor.clone(), off),
        }
    }

    /// The "turn on" half (add, like).
    #[must_use]
    pub const fn on(&self) -> &ToggleOperation<S, K, E> {
        &self.on
    }

    /// The "turn off" half (remove, unlike).
    #[must_use]
    pub const fn off(&self) -> &ToggleOperation<S, K, E> {
        &self.off
    }

    /// Run whichever half flips `key` away from `currently_on`.
    ///
    /// # Errors
    ///
    /// Returns the remote error after the executor has rolled back.
    pub async fn flip(&self, key: K, currently_on: bool) -> Result<MutationOutcome, E> {
        if currently_on {
            self.off.run(key).await
        } else {
            self.on.run(key).await
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    use super::*;
    use crate::sync::store::StateStore;

    type Set = BTreeSet<u32>;

    type CallLog = Arc<Mutex<Vec<(&'static str, u32)>>>;

    fn pair(
        log: CallLog,
        fail: bool,
    ) -> (MutationExecutor<Set, u32>, TogglePair<Set, u32, String>) {
        let exec = MutationExecutor::new(StateStore::new(Set::new()));

        let add_log = Arc::clone(&log);
        let add = ToggleTemplate::new(
            |s: &Set, k: &u32| {
                let mut next = s.clone();
                next.insert(*k);
                next
            },
            |s: &Set, k: &u32| {
                let mut next = s.clone();
                next.remove(k);
                next
            },
            move |k, _token| {
                add_log.lock().unwrap().push(("add", k));
                async move {
                    if fail {
                        Err(format!("add {k} failed"))
                    } else {
                        Ok(())
                    }
                }
            },
        );

        let remove_log = Arc::clone(&log);
        let remove = ToggleTemplate::new(
            |s: &Set, k: &u32| {
                let mut next = s.clone();
                next.remove(k);
                next
            },
            |s: &Set, k: &u32| {
                let mut next = s.clone();
                next.insert(*k);
                next
            },
            move |k, _token| {
                remove_log.lock().unwrap().push(("remove", k));
                async move {
                    if fail {
                        Err(format!("remove {k} failed"))
                    } else {
                        Ok(())
                    }
                }
            },
        );

        let toggles = TogglePair::new(&exec, add, remove);
        (exec, toggles)
    }

    #[tokio::test]
    async fn test_flip_dispatches_on_current_value() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (exec, toggles) = pair(Arc::clone(&log), false);

        toggles.flip(1, false).await.unwrap();
        assert!(exec.store().snapshot().contains(&1));

        toggles.flip(1, true).await.unwrap();
        assert!(exec.store().snapshot().is_empty());

        assert_eq!(*log.lock().unwrap(), vec![("add", 1), ("remove", 1)]);
    }

    #[tokio::test]
    async fn test_failed_half_is_reverted() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (exec, toggles) = pair(log, true);

        let err = toggles.on().run(3).await.unwrap_err();
        assert_eq!(err, "add 3 failed");
        assert!(exec.store().snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_halves_share_pending_keys() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let exec = MutationExecutor::<Set, u32>::new(StateStore::new(Set::new()));
        let hang = ToggleTemplate::<Set, u32, String>::new(
            |s: &Set, k: &u32| {
                let mut next = s.clone();
                next.insert(*k);
                next
            },
            |s: &Set, _: &u32| s.clone(),
            |_, _| std::future::pending(),
        );
        let counted_log = Arc::clone(&log);
        let counted = ToggleTemplate::<Set, u32, String>::new(
            |s: &Set, _: &u32| s.clone(),
            |s: &Set, _: &u32| s.clone(),
            move |k, _| {
                counted_log.lock().unwrap().push(("off", k));
                async { Ok(()) }
            },
        );
        let toggles = TogglePair::new(&exec, hang, counted);

        let first = toggles.on().run(9);
        tokio::pin!(first);
        assert!(futures::poll!(&mut first).is_pending());

        let outcome = toggles.off().run(9).await.unwrap();
        assert_eq!(outcome, MutationOutcome::Deduplicated);
        assert!(log.lock().unwrap().is_empty());
    }
}
