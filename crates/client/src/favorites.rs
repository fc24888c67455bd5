//! Favorite shops.
//!
//! Toggling is optimistic and runs through the shared mutation core.
//! Loading is not optimistic: it replaces local state with the server's list.

use std::collections::BTreeSet;
use std::sync::Arc;

use shop_scout_core::ShopId;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::identity::AccessToken;
use crate::remote::{FavoritesApi, RemoteError};
use crate::sync::{
    AuthOutcome, AuthResolver, MutationExecutor, MutationOutcome, StateStore, TogglePair,
    ToggleTemplate,
};

/// The set of favorited shops.
pub type FavoriteSet = BTreeSet<ShopId>;

/// Collaborators of [`FavoritesState`].
pub struct FavoritesDeps<A> {
    /// Remote favorites API.
    pub api: Arc<A>,
    /// Decides per attempt whether to call the backend.
    pub auth: Arc<dyn AuthResolver>,
}

/// Favorites feature instance.
///
/// Starts empty. Dropping it (or calling [`close`](Self::close)) retires the
/// store, so calls still in flight complete without touching state.
pub struct FavoritesState<A> {
    api: Arc<A>,
    auth: Arc<dyn AuthResolver>,
    executor: MutationExecutor<FavoriteSet, ShopId>,
    toggles: TogglePair<FavoriteSet, ShopId, RemoteError>,
}

impl<A: FavoritesApi + 'static> FavoritesState<A> {
    #[must_use]
    pub fn new(deps: FavoritesDeps<A>) -> Self {
        let FavoritesDeps { api, auth } = deps;
        let executor = MutationExecutor::new(StateStore::new(FavoriteSet::new()))
            .with_auth(Arc::clone(&auth));

        let add_api = Arc::clone(&api);
        let add = ToggleTemplate::new(
            |set: &FavoriteSet, id: &ShopId| with_shop(set, id),
            |set: &FavoriteSet, id: &ShopId| without_shop(set, id),
            move |id: ShopId, token: Option<AccessToken>| {
                let api = Arc::clone(&add_api);
                async move {
                    match token {
                        Some(token) => api.add_favorite(&token, &id).await,
                        None => Err(RemoteError::MissingToken),
                    }
                }
            },
        );

        let remove_api = Arc::clone(&api);
        let remove = ToggleTemplate::new(
            |set: &FavoriteSet, id: &ShopId| without_shop(set, id),
            |set: &FavoriteSet, id: &ShopId| with_shop(set, id),
            move |id: ShopId, token: Option<AccessToken>| {
                let api = Arc::clone(&remove_api);
                async move {
                    match token {
                        Some(token) => api.remove_favorite(&token, &id).await,
                        None => Err(RemoteError::MissingToken),
                    }
                }
            },
        );

        let toggles = TogglePair::new(&executor, add, remove);

        Self {
            api,
            auth,
            executor,
            toggles,
        }
    }

    /// Current favorites.
    #[must_use]
    pub fn favorites(&self) -> Arc<FavoriteSet> {
        self.executor.store().snapshot()
    }

    /// Receive every new version of the favorites.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<FavoriteSet>> {
        self.executor.store().subscribe()
    }

    #[must_use]
    pub fn is_favorite(&self, shop_id: &ShopId) -> bool {
        self.favorites().contains(shop_id)
    }

    /// Whether a toggle for `shop_id` is waiting on the backend.
    #[must_use]
    pub fn is_operation_pending(&self, shop_id: &ShopId) -> bool {
        self.executor.is_pending(shop_id)
    }

    /// Favorite `shop_id` if it is not a favorite, unfavorite it otherwise.
    ///
    /// Returns [`MutationOutcome::Deduplicated`] without doing anything if a
    /// toggle for the same shop is already in flight.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Remote`](crate::SyncError::Remote) after rolling
    /// back if the backend refuses the change.
    #[instrument(skip(self), fields(shop_id = %shop_id))]
    pub async fn toggle_favorite(&self, shop_id: ShopId) -> Result<MutationOutcome> {
        let currently_on = self.is_favorite(&shop_id);
        let outcome = self.toggles.flip(shop_id, currently_on).await?;
        Ok(outcome)
    }

    /// Replace local favorites with the backend's list.
    ///
    /// Leaves local state untouched when auth resolves to skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Remote`](crate::SyncError::Remote) if the fetch
    /// fails. Local state is unchanged in that case.
    #[instrument(skip(self))]
    pub async fn load_favorites(&self) -> Result<()> {
        let token = match self.auth.resolve() {
            AuthOutcome::Skipped => {
                debug!("Auth skipped, keeping local favorites");
                return Ok(());
            }
            AuthOutcome::Proceed(token) => token,
        };

        let ids = self.api.fetch_favorites(&token).await?;
        info!(count = ids.len(), "Loaded favorites");
        self.executor.store().replace(ids.into_iter().collect());
        Ok(())
    }
}

impl<A> FavoritesState<A> {
    /// Tear the feature down. Later state writes are ignored.
    pub fn close(&self) {
        self.executor.store().retire();
    }
}

impl<A> Drop for FavoritesState<A> {
    fn drop(&mut self) {
        self.close();
    }
}

fn with_shop(set: &FavoriteSet, id: &ShopId) -> FavoriteSet {
    let mut next = set.clone();
    next.insert(id.clone());
    next
}

fn without_shop(set: &FavoriteSet, id: &ShopId) -> FavoriteSet {
    let mut next = set.clone();
    next.remove(id);
    next
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::SyncError;
    use crate::remote::RemoteResult;

    #[derive(Default)]
    struct RecordingApi {
        remote: Mutex<Vec<ShopId>>,
        calls: Mutex<Vec<&'static str>>,
        reject: bool,
    }

    impl RecordingApi {
        fn result(&self) -> RemoteResult<()> {
            if self.reject {
                Err(RemoteError::Rejected("nope".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl FavoritesApi for RecordingApi {
        async fn fetch_favorites(&self, _token: &AccessToken) -> RemoteResult<Vec<ShopId>> {
            self.calls.lock().unwrap().push("fetch");
            Ok(self.remote.lock().unwrap().clone())
        }

        async fn add_favorite(&self, _token: &AccessToken, _shop_id: &ShopId) -> RemoteResult<()> {
            self.calls.lock().unwrap().push("add");
            self.result()
        }

        async fn remove_favorite(
            &self,
            _token: &AccessToken,
            _shop_id: &ShopId,
        ) -> RemoteResult<()> {
            self.calls.lock().unwrap().push("remove");
            self.result()
        }
    }

    fn proceed() -> Arc<dyn AuthResolver> {
        Arc::new(|| AuthOutcome::Proceed(AccessToken::new("tok")))
    }

    fn state(
        api: RecordingApi,
        auth: Arc<dyn AuthResolver>,
    ) -> (Arc<RecordingApi>, FavoritesState<RecordingApi>) {
        let api = Arc::new(api);
        let state = FavoritesState::new(FavoritesDeps {
            api: Arc::clone(&api),
            auth,
        });
        (api, state)
    }

    #[tokio::test]
    async fn test_toggle_adds_then_removes() {
        let (api, favorites) = state(RecordingApi::default(), proceed());
        let shop = ShopId::new("shop-1");

        favorites.toggle_favorite(shop.clone()).await.unwrap();
        assert!(favorites.is_favorite(&shop));

        favorites.toggle_favorite(shop.clone()).await.unwrap();
        assert!(favorites.favorites().is_empty());

        assert_eq!(*api.calls.lock().unwrap(), vec!["add", "remove"]);
    }

    #[tokio::test]
    async fn test_rejected_toggle_rolls_back() {
        let (_api, favorites) = state(
            RecordingApi {
                reject: true,
                ..RecordingApi::default()
            },
            proceed(),
        );

        let err = favorites
            .toggle_favorite(ShopId::new("shop-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Remote(RemoteError::Rejected(_))));
        assert!(favorites.favorites().is_empty());
    }

    #[tokio::test]
    async fn test_load_replaces_local_state() {
        let api = RecordingApi::default();
        api.remote
            .lock()
            .unwrap()
            .extend([ShopId::new("a"), ShopId::new("b")]);
        let (_api, favorites) = state(api, proceed());

        favorites.load_favorites().await.unwrap();
        let expected: FavoriteSet = [ShopId::new("a"), ShopId::new("b")].into();
        assert_eq!(*favorites.favorites(), expected);
    }

    #[tokio::test]
    async fn test_load_skipped_keeps_local_state() {
        let (api, favorites) = state(RecordingApi::default(), Arc::new(|| AuthOutcome::Skipped));

        favorites
            .toggle_favorite(ShopId::new("local"))
            .await
            .unwrap();
        favorites.load_favorites().await.unwrap();

        assert!(favorites.is_favorite(&ShopId::new("local")));
        assert!(api.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_feature_ignores_writes() {
        let (_api, favorites) = state(RecordingApi::default(), Arc::new(|| AuthOutcome::Skipped));
        favorites.close();
        favorites.toggle_favorite(ShopId::new("a")).await.unwrap();
        assert!(favorites.favorites().is_empty());
    }
}
