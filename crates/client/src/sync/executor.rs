//! Mutation executor.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tracing::{debug, warn};

use super::auth::{AuthOutcome, AuthResolver};
use super::pending::PendingKeys;
use super::store::StateStore;
use crate::identity::AccessToken;

/// How a successful [`MutationExecutor::execute`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The key was already pending; nothing was changed or sent.
    Deduplicated,
    /// Auth resolved to `Skipped`; the change was applied and kept locally.
    AppliedLocally,
    /// The backend accepted the change.
    Confirmed,
}

/// One optimistic mutation.
///
/// - `optimistic` produces the next state from the current one
/// - `remote` confirms the change with the backend; it receives the resolved
///   token, or `None` when the executor has no auth resolver
/// - `rollback` reverts the change on top of whatever the state is when the
///   remote call fails; it is never handed a stored snapshot
pub struct Mutation<K, O, C, R> {
    key: Option<K>,
    optimistic: O,
    remote: C,
    rollback: R,
}

impl<K, O, C, R> Mutation<K, O, C, R> {
    /// Create an unkeyed mutation. Unkeyed mutations are never deduplicated.
    pub const fn new(optimistic: O, remote: C, rollback: R) -> Self {
        Self {
            key: None,
            optimistic,
            remote,
            rollback,
        }
    }

    /// Key the mutation so that concurrent attempts on the same key collapse.
    #[must_use]
    pub fn keyed(mut self, key: K) -> Self {
        self.key = Some(key);
        self
    }
}

/// Runs mutations against one state store and one pending-key set.
///
/// Clones share the store, the pending set and the resolver.
pub struct MutationExecutor<S, K> {
    store: StateStore<S>,
    pending: PendingKeys<K>,
    auth: Option<Arc<dyn AuthResolver>>,
}

impl<S, K> Clone for MutationExecutor<S, K> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            pending: self.pending.clone(),
            auth: self.auth.clone(),
        }
    }
}

impl<S, K> MutationExecutor<S, K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    /// Create an executor without an auth resolver: every mutation goes to
    /// the backend.
    #[must_use]
    pub fn new(store: StateStore<S>) -> Self {
        Self {
            store,
            pending: PendingKeys::new(),
            auth: None,
        }
    }

    /// Resolve auth before every mutation.
    #[must_use]
    pub fn with_auth(mut self, auth: Arc<dyn AuthResolver>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// The store this executor writes to.
    #[must_use]
    pub const fn store(&self) -> &StateStore<S> {
        &self.store
    }

    /// Whether a mutation for `key` is in flight.
    #[must_use]
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.is_pending(key)
    }

    /// Read-only view of the pending-key set.
    #[must_use]
    pub const fn pending(&self) -> &PendingKeys<K> {
        &self.pending
    }

    /// Run one mutation.
    ///
    /// 1. A keyed mutation whose key is pending returns `Deduplicated`.
    /// 2. If auth resolves to `Skipped`, the optimistic change is applied and
    ///    kept, and `AppliedLocally` is returned without calling the backend.
    /// 3. Otherwise the optimistic change is applied, the key is marked
    ///    pending and the remote call is awaited. On failure the rollback is
    ///    applied and the remote error is returned unchanged. The key is
    ///    released on every path.
    ///
    /// # Errors
    ///
    /// Returns the remote call's error after rolling back.
    pub async fn execute<O, C, R, Fut, E>(
        &self,
        mutation: Mutation<K, O, C, R>,
    ) -> Result<MutationOutcome, E>
    where
        O: FnOnce(&S) -> S,
        R: FnOnce(&S) -> S,
        C: FnOnce(Option<AccessToken>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let Mutation {
            key,
            optimistic,
            remote,
            rollback,
        } = mutation;

        if let Some(key) = &key
            && self.pending.is_pending(key)
        {
            debug!(?key, "Mutation already pending, ignoring");
            return Ok(MutationOutcome::Deduplicated);
        }

        let token = match self.auth.as_ref().map(|auth| auth.resolve()) {
            Some(AuthOutcome::Skipped) => {
                self.store.update(optimistic);
                debug!(?key, "Mutation applied locally");
                return Ok(MutationOutcome::AppliedLocally);
            }
            Some(AuthOutcome::Proceed(token)) => Some(token),
            None => None,
        };

        // Released on drop: after rollback, on success, or if this future is
        // dropped mid-flight.
        let _claim = match key.clone() {
            Some(key) => match self.pending.try_claim(key) {
                Some(claim) => Some(claim),
                None => return Ok(MutationOutcome::Deduplicated),
            },
            None => None,
        };

        self.store.update(optimistic);

        match remote(token).await {
            Ok(()) => {
                debug!(?key, "Mutation confirmed");
                Ok(MutationOutcome::Confirmed)
            }
            Err(err) => {
                warn!(?key, "Remote call failed, rolling back");
                self.store.update(rollback);
                Err(err)
            }
        }
    }
}
