//! Shop reviews.
//!
//! Likes are optimistic and go through the shared mutation core, keyed by
//! review ID. Creating a review is not optimistic: attachments are uploaded
//! first, then the review is created, then the shop's list is reloaded.
//!
//! # Create flow
//!
//! ```text
//! resolve auth ──▶ request N slots ──▶ upload N (concurrent) ──▶ create ──▶ reload shop
//!      │                 │                      │                    │           │
//!      ▼                 ▼                      ▼                    ▼           ▼
//!  AuthRequired   UploadCountMismatch     Upload { index }        Remote    ReloadFailed
//! ```
//!
//! Nothing is written to local state until the reload returns; the new review
//! reaches the shop's list only as part of the server's answer. A failed
//! reload still hands the created review back inside
//! [`SyncError::ReloadFailed`]. Objects already uploaded when a later step
//! fails are left in storage.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::try_join_all;
use shop_scout_core::{
    Attachment, FileId, Review, ReviewId, ReviewInput, ReviewSortOrder, ShopId, UploadSlot,
};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SyncError};
use crate::identity::{AccessToken, IdentityProvider};
use crate::remote::{RemoteError, ReviewsApi, StorageClient};
use crate::sync::{
    AuthOutcome, AuthResolver, MutationExecutor, MutationOutcome, StateStore, TogglePair,
    ToggleTemplate,
};

// =============================================================================
// ReviewBook
// =============================================================================

/// Every review the feature knows about.
///
/// Each review is stored once. A shop's list and the viewer's own list hold
/// IDs into that store, so a review that appears in both always agrees with
/// itself. The most recent fetch of a review wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewBook {
    reviews: HashMap<ReviewId, Review>,
    by_shop: HashMap<ShopId, Vec<ReviewId>>,
    mine: Vec<ReviewId>,
}

impl ReviewBook {
    /// Reviews loaded for `shop_id`, in server order.
    #[must_use]
    pub fn shop(&self, shop_id: &ShopId) -> Vec<Review> {
        self.by_shop
            .get(shop_id)
            .map(|ids| self.resolve(ids))
            .unwrap_or_default()
    }

    /// Reviews written by the viewer.
    #[must_use]
    pub fn mine(&self) -> Vec<Review> {
        self.resolve(&self.mine)
    }

    #[must_use]
    pub fn find(&self, review_id: &ReviewId) -> Option<&Review> {
        self.reviews.get(review_id)
    }

    /// Every review the viewer has liked, newest first.
    #[must_use]
    pub fn liked(&self) -> Vec<Review> {
        let mut liked: Vec<Review> = self
            .reviews
            .values()
            .filter(|r| r.liked_by_me())
            .cloned()
            .collect();
        liked.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        liked
    }

    /// Copy with `shop_id`'s list replaced.
    #[must_use]
    pub fn with_shop(&self, shop_id: ShopId, reviews: Vec<Review>) -> Self {
        let mut next = self.clone();
        let ids = next.absorb(reviews);
        next.by_shop.insert(shop_id, ids);
        next.prune();
        next
    }

    /// Copy with the viewer's own list replaced.
    #[must_use]
    pub fn with_mine(&self, reviews: Vec<Review>) -> Self {
        let mut next = self.clone();
        next.mine = next.absorb(reviews);
        next.prune();
        next
    }

    /// Copy with `review_id`'s like flag set to `liked`.
    ///
    /// Setting the flag it already has, or naming an unknown review, changes
    /// nothing.
    #[must_use]
    pub fn with_liked(&self, review_id: &ReviewId, liked: bool) -> Self {
        let mut next = self.clone();
        if let Some(review) = next.reviews.get_mut(review_id) {
            review.set_liked(liked);
        }
        next
    }

    /// Copy with `review_id` removed from every list.
    #[must_use]
    pub fn without(&self, review_id: &ReviewId) -> Self {
        let mut next = self.clone();
        next.reviews.remove(review_id);
        for ids in next.by_shop.values_mut() {
            ids.retain(|id| id != review_id);
        }
        next.mine.retain(|id| id != review_id);
        next
    }

    fn resolve(&self, ids: &[ReviewId]) -> Vec<Review> {
        ids.iter()
            .filter_map(|id| self.reviews.get(id))
            .cloned()
            .collect()
    }

    fn absorb(&mut self, reviews: Vec<Review>) -> Vec<ReviewId> {
        reviews
            .into_iter()
            .map(|review| {
                let id = review.id.clone();
                self.reviews.insert(id.clone(), review);
                id
            })
            .collect()
    }

    /// Drop stored reviews no list refers to any more.
    fn prune(&mut self) {
        let referenced: HashSet<&ReviewId> =
            self.by_shop.values().flatten().chain(&self.mine).collect();
        let stale: Vec<ReviewId> = self
            .reviews
            .keys()
            .filter(|id| !referenced.contains(id))
            .cloned()
            .collect();
        for id in stale {
            self.reviews.remove(&id);
        }
    }
}

// =============================================================================
// ReviewsState
// =============================================================================

/// Collaborators of [`ReviewsState`].
pub struct ReviewsDeps<A, St, I> {
    /// Remote reviews API.
    pub api: Arc<A>,
    /// Object storage for attachments.
    pub storage: Arc<St>,
    /// Source of the viewer's user ID.
    pub identity: Arc<I>,
    /// Decides per attempt whether to call the backend.
    pub auth: Arc<dyn AuthResolver>,
}

/// Reviews feature instance.
///
/// Starts empty. Dropping it (or calling [`close`](Self::close)) retires the
/// store, so calls still in flight complete without touching state.
pub struct ReviewsState<A, St, I> {
    api: Arc<A>,
    storage: Arc<St>,
    identity: Arc<I>,
    auth: Arc<dyn AuthResolver>,
    executor: MutationExecutor<ReviewBook, ReviewId>,
    likes: TogglePair<ReviewBook, ReviewId, RemoteError>,
    /// Sort order of the last load per shop, reused for reloads.
    sorts: Mutex<HashMap<ShopId, ReviewSortOrder>>,
}

impl<A, St, I> ReviewsState<A, St, I>
where
    A: ReviewsApi + 'static,
    St: StorageClient,
    I: IdentityProvider,
{
    #[must_use]
    pub fn new(deps: ReviewsDeps<A, St, I>) -> Self {
        let ReviewsDeps {
            api,
            storage,
            identity,
            auth,
        } = deps;
        let executor = MutationExecutor::new(StateStore::new(ReviewBook::default()))
            .with_auth(Arc::clone(&auth));

        let like_api = Arc::clone(&api);
        let like = ToggleTemplate::new(
            |book: &ReviewBook, id: &ReviewId| book.with_liked(id, true),
            |book: &ReviewBook, id: &ReviewId| book.with_liked(id, false),
            move |id: ReviewId, token: Option<AccessToken>| {
                let api = Arc::clone(&like_api);
                async move {
                    match token {
                        Some(token) => api.like_review(&token, &id).await,
                        None => Err(RemoteError::MissingToken),
                    }
                }
            },
        );

        let unlike_api = Arc::clone(&api);
        let unlike = ToggleTemplate::new(
            |book: &ReviewBook, id: &ReviewId| book.with_liked(id, false),
            |book: &ReviewBook, id: &ReviewId| book.with_liked(id, true),
            move |id: ReviewId, token: Option<AccessToken>| {
                let api = Arc::clone(&unlike_api);
                async move {
                    match token {
                        Some(token) => api.unlike_review(&token, &id).await,
                        None => Err(RemoteError::MissingToken),
                    }
                }
            },
        );

        let likes = TogglePair::new(&executor, like, unlike);

        Self {
            api,
            storage,
            identity,
            auth,
            executor,
            likes,
            sorts: Mutex::new(HashMap::new()),
        }
    }

    /// The whole review book.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ReviewBook> {
        self.executor.store().snapshot()
    }

    /// Receive every new version of the review book.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<ReviewBook>> {
        self.executor.store().subscribe()
    }

    /// Reviews loaded for `shop_id`.
    #[must_use]
    pub fn get_reviews(&self, shop_id: &ShopId) -> Vec<Review> {
        self.snapshot().shop(shop_id)
    }

    /// Reviews written by the viewer, as of the last
    /// [`load_user_reviews`](Self::load_user_reviews).
    #[must_use]
    pub fn user_reviews(&self) -> Vec<Review> {
        self.snapshot().mine()
    }

    #[must_use]
    pub fn is_review_liked(&self, review_id: &ReviewId) -> bool {
        self.snapshot().find(review_id).is_some_and(Review::liked_by_me)
    }

    /// Like count of `review_id`, or zero if it is not loaded.
    #[must_use]
    pub fn get_review_likes_count(&self, review_id: &ReviewId) -> u32 {
        self.snapshot().find(review_id).map_or(0, Review::likes_count)
    }

    #[must_use]
    pub fn get_liked_reviews(&self) -> Vec<Review> {
        self.snapshot().liked()
    }

    /// Whether a like or unlike of `review_id` is waiting on the backend.
    #[must_use]
    pub fn is_like_pending(&self, review_id: &ReviewId) -> bool {
        self.executor.is_pending(review_id)
    }

    /// Fetch `shop_id`'s reviews in `sort` order and replace the local list.
    ///
    /// Reading does not need a session. When one exists its token is sent so
    /// the backend can fill in the viewer's like flags.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Remote`] if the fetch fails. Local state is
    /// unchanged in that case.
    #[instrument(skip(self), fields(shop_id = %shop_id, sort = %sort))]
    pub async fn load_reviews(&self, shop_id: &ShopId, sort: ReviewSortOrder) -> Result<()> {
        let token = match self.auth.resolve() {
            AuthOutcome::Proceed(token) => Some(token),
            AuthOutcome::Skipped => None,
        };

        let reviews = self
            .api
            .fetch_shop_reviews(token.as_ref(), shop_id, sort)
            .await?;
        self.store_shop(shop_id, sort, reviews);
        Ok(())
    }

    /// Fetch the viewer's own reviews and replace the local list.
    ///
    /// Leaves local state untouched when auth resolves to skipped.
    ///
    /// # Errors
    ///
    /// - [`SyncError::AuthRequired`] if a token exists but no user ID does
    /// - [`SyncError::Remote`] if the fetch fails
    #[instrument(skip(self))]
    pub async fn load_user_reviews(&self) -> Result<()> {
        let token = match self.auth.resolve() {
            AuthOutcome::Skipped => {
                debug!("Auth skipped, keeping local user reviews");
                return Ok(());
            }
            AuthOutcome::Proceed(token) => token,
        };
        let user_id = self.identity.user_id().ok_or(SyncError::AuthRequired)?;

        let reviews = self.api.fetch_user_reviews(&token, &user_id).await?;
        info!(count = reviews.len(), "Loaded user reviews");
        self.executor.store().update(|book| book.with_mine(reviews));
        Ok(())
    }

    /// Like `review_id` (shown in `shop_id`'s list) if the viewer has not
    /// liked it, unlike it otherwise.
    ///
    /// # Errors
    ///
    /// - [`SyncError::ReviewNotFound`] if the review is not loaded
    /// - [`SyncError::Remote`] after rolling back if the backend refuses
    #[instrument(skip(self), fields(shop_id = %shop_id, review_id = %review_id))]
    pub async fn toggle_like(
        &self,
        shop_id: &ShopId,
        review_id: &ReviewId,
    ) -> Result<MutationOutcome> {
        let currently_liked = self
            .snapshot()
            .find(review_id)
            .map(Review::liked_by_me)
            .ok_or_else(|| SyncError::ReviewNotFound(review_id.clone()))?;

        let outcome = self.likes.flip(review_id.clone(), currently_liked).await?;
        Ok(outcome)
    }

    /// Create a review with optional attachments.
    ///
    /// Returns the review as stored by the backend. Local state only changes
    /// through the reload of the shop's list that follows the create.
    ///
    /// # Errors
    ///
    /// - [`SyncError::AuthRequired`] if there is no session (or demo mode is on)
    /// - [`SyncError::UploadCountMismatch`] if the backend issues the wrong
    ///   number of upload slots
    /// - [`SyncError::Upload`] if an attachment fails to upload
    /// - [`SyncError::Remote`] if requesting slots or creating the review fails
    /// - [`SyncError::ReloadFailed`] if the review was created but the shop's
    ///   list could not be reloaded; the error carries the created review
    #[instrument(
        skip(self, input, attachments),
        fields(shop_id = %shop_id, attachments = attachments.len())
    )]
    pub async fn add_review(
        &self,
        shop_id: &ShopId,
        input: ReviewInput,
        attachments: Vec<Attachment>,
    ) -> Result<Review> {
        let AuthOutcome::Proceed(token) = self.auth.resolve() else {
            return Err(SyncError::AuthRequired);
        };

        let file_ids = self
            .upload_attachments(&token, shop_id, &attachments)
            .await?;

        let review = self
            .api
            .create_review(&token, shop_id, &input, &file_ids)
            .await?;
        info!(review_id = %review.id, "Review created");

        let sort = self.last_sort(shop_id);
        match self
            .api
            .fetch_shop_reviews(Some(&token), shop_id, sort)
            .await
        {
            Ok(reviews) => self.store_shop(shop_id, sort, reviews),
            Err(source) => {
                warn!(review_id = %review.id, error = %source, "Reloading shop reviews failed");
                return Err(SyncError::ReloadFailed {
                    review: Box::new(review),
                    source,
                });
            }
        }

        Ok(review)
    }

    /// Remove `review_id` from local state. Does not call the backend.
    ///
    /// Returns whether the review was present.
    pub fn delete_review(&self, review_id: &ReviewId) -> bool {
        let present = self.snapshot().find(review_id).is_some();
        if present {
            self.executor.store().update(|book| book.without(review_id));
            debug!(review_id = %review_id, "Review removed locally");
        }
        present
    }

    /// Sort order of the last load of `shop_id`, or the default.
    fn last_sort(&self, shop_id: &ShopId) -> ReviewSortOrder {
        self.sorts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(shop_id)
            .copied()
            .unwrap_or_default()
    }

    fn store_shop(&self, shop_id: &ShopId, sort: ReviewSortOrder, reviews: Vec<Review>) {
        info!(count = reviews.len(), "Loaded shop reviews");
        self.sorts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(shop_id.clone(), sort);
        self.executor
            .store()
            .update(|book| book.with_shop(shop_id.clone(), reviews));
    }

    async fn upload_attachments(
        &self,
        token: &AccessToken,
        shop_id: &ShopId,
        attachments: &[Attachment],
    ) -> Result<Vec<FileId>> {
        if attachments.is_empty() {
            return Ok(Vec::new());
        }

        let slots = self
            .api
            .request_upload_slots(token, shop_id, attachments.len())
            .await?;
        if slots.len() != attachments.len() {
            return Err(SyncError::UploadCountMismatch {
                expected: attachments.len(),
                received: slots.len(),
            });
        }

        let storage = &self.storage;
        try_join_all(slots.iter().zip(attachments).enumerate().map(
            |(index, (slot, attachment))| async move {
                storage
                    .upload(slot, attachment)
                    .await
                    .map_err(|source| SyncError::Upload { index, source })
            },
        ))
        .await?;
        debug!(count = slots.len(), "Attachments uploaded");

        Ok(slots.iter().map(UploadSlot::file_id).collect())
    }
}

impl<A, St, I> ReviewsState<A, St, I> {
    /// Tear the feature down. Later state writes are ignored.
    pub fn close(&self) {
        self.executor.store().retire();
    }
}

impl<A, St, I> Drop for ReviewsState<A, St, I> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use shop_scout_core::UserId;

    use super::*;

    fn review(id: &str, shop: &str, liked: bool, likes: u32) -> Review {
        Review::new(
            ReviewId::new(id),
            ShopId::new(shop),
            UserId::new("author"),
            4,
            "Good coffee",
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        )
        .with_likes(liked, likes)
    }

    fn book() -> ReviewBook {
        ReviewBook::default()
            .with_shop(
                ShopId::new("s1"),
                vec![review("r1", "s1", false, 5), review("r2", "s1", true, 1)],
            )
            .with_mine(vec![review("r1", "s1", false, 5)])
    }

    #[test]
    fn test_shop_returns_empty_for_unknown_shop() {
        assert!(book().shop(&ShopId::new("nope")).is_empty());
    }

    #[test]
    fn test_shop_keeps_server_order() {
        let ids: Vec<_> = book()
            .shop(&ShopId::new("s1"))
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![ReviewId::new("r1"), ReviewId::new("r2")]);
    }

    #[test]
    fn test_with_liked_is_seen_from_both_lists() {
        let next = book().with_liked(&ReviewId::new("r1"), true);
        let in_shop = next.shop(&ShopId::new("s1")).remove(0);
        assert!(in_shop.liked_by_me());
        assert_eq!(in_shop.likes_count(), 6);
        assert_eq!(next.mine(), vec![in_shop]);
    }

    #[test]
    fn test_with_liked_same_value_is_noop() {
        let before = book();
        assert_eq!(before.with_liked(&ReviewId::new("r2"), true), before);
    }

    #[test]
    fn test_like_then_unlike_restores_book() {
        let before = book();
        let after = before
            .with_liked(&ReviewId::new("r1"), true)
            .with_liked(&ReviewId::new("r1"), false);
        assert_eq!(after, before);
    }

    #[test]
    fn test_latest_fetch_wins_for_shared_review() {
        let book = ReviewBook::default()
            .with_shop(ShopId::new("s1"), vec![review("r1", "s1", false, 2)])
            .with_mine(vec![review("r1", "s1", true, 3)]);

        let in_shop = book.shop(&ShopId::new("s1")).remove(0);
        assert!(in_shop.liked_by_me());
        assert_eq!(in_shop.likes_count(), 3);
        assert_eq!(book.find(&ReviewId::new("r1")), Some(&in_shop));
    }

    #[test]
    fn test_liked_lists_each_review_once() {
        let next = book().with_liked(&ReviewId::new("r1"), true);
        let mut ids: Vec<_> = next.liked().into_iter().map(|r| r.id).collect();
        ids.sort();
        assert_eq!(ids, vec![ReviewId::new("r1"), ReviewId::new("r2")]);
    }

    #[test]
    fn test_without_removes_from_both_lists() {
        let next = book().without(&ReviewId::new("r1"));
        assert_eq!(next.shop(&ShopId::new("s1")).len(), 1);
        assert!(next.mine().is_empty());
        assert!(next.find(&ReviewId::new("r1")).is_none());
    }

    #[test]
    fn test_replacing_list_drops_unreferenced_reviews() {
        let next = book().with_shop(ShopId::new("s1"), vec![review("r3", "s1", false, 0)]);

        // r1 is still in the viewer's list, r2 is gone
        assert!(next.find(&ReviewId::new("r1")).is_some());
        assert!(next.find(&ReviewId::new("r2")).is_none());
        assert_eq!(next.liked(), Vec::new());
    }
}
