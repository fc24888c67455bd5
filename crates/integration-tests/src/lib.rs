//! Integration tests for Shop Scout.
//!
//! This library holds in-memory fakes of every backend collaborator. The
//! behavioural tests live in `tests/`.
//!
//! # Running Tests
//!
//! ```bash
//! # Behavioural tests (no network)
//! cargo test -p shop-scout-integration-tests
//!
//! # Live smoke test against a configured backend
//! cargo test -p shop-scout-integration-tests -- --ignored
//! ```
//!
//! # Controlling remote calls
//!
//! Every fake call looks up a [`Behavior`] for its key before answering:
//!
//! - [`Behavior::Succeed`] - answer immediately (the default)
//! - [`Behavior::Fail`] - answer with [`RemoteError::Rejected`]
//! - [`Behavior::Hang`] - never answer, to hold a key pending
//! - [`Behavior::Gate`] - succeed once the test calls `notify_one` on the gate
//! - [`Behavior::FailAfter`] - fail once the test calls `notify_one` on the gate
//!
//! Locks inside the fakes are never held across an await.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use shop_scout_client::remote::RemoteResult;
use shop_scout_client::{
    AccessToken, AuthOutcome, AuthResolver, FavoritesApi, RemoteError, ReviewsApi, Session,
    SessionIdentity, StorageClient,
};
use shop_scout_core::{
    Attachment, FileId, Review, ReviewId, ReviewInput, ReviewSortOrder, ShopId, UploadSlot, UserId,
};
use tokio::sync::Notify;

// =============================================================================
// Behaviour scripting
// =============================================================================

/// How a fake answers one call.
#[derive(Clone, Default)]
pub enum Behavior {
    #[default]
    Succeed,
    Fail,
    Hang,
    Gate(Arc<Notify>),
    FailAfter(Arc<Notify>),
}

impl Behavior {
    /// A gate plus the behaviour waiting on it.
    #[must_use]
    pub fn gate() -> (Arc<Notify>, Self) {
        let notify = Arc::new(Notify::new());
        (Arc::clone(&notify), Self::Gate(notify))
    }

    /// A gate plus a failure waiting on it.
    #[must_use]
    pub fn gate_fail() -> (Arc<Notify>, Self) {
        let notify = Arc::new(Notify::new());
        (Arc::clone(&notify), Self::FailAfter(notify))
    }

    async fn play(self, what: &str) -> RemoteResult<()> {
        match self {
            Self::Succeed => Ok(()),
            Self::Fail => Err(RemoteError::Rejected(format!("{what} rejected"))),
            Self::Hang => std::future::pending().await,
            Self::Gate(notify) => {
                notify.notified().await;
                Ok(())
            }
            Self::FailAfter(notify) => {
                notify.notified().await;
                Err(RemoteError::Rejected(format!("{what} rejected")))
            }
        }
    }
}

/// Per-key behaviours with a fallback.
pub struct Script<K> {
    fallback: Mutex<Behavior>,
    by_key: Mutex<HashMap<K, Behavior>>,
}

impl<K> Default for Script<K> {
    fn default() -> Self {
        Self {
            fallback: Mutex::new(Behavior::Succeed),
            by_key: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash> Script<K> {
    /// Behaviour for every key without its own.
    pub fn set_fallback(&self, behavior: Behavior) {
        *self.fallback.lock().unwrap() = behavior;
    }

    /// Behaviour for one key.
    pub fn set(&self, key: K, behavior: Behavior) {
        self.by_key.lock().unwrap().insert(key, behavior);
    }

    fn lookup(&self, key: &K) -> Behavior {
        let by_key = self.by_key.lock().unwrap();
        by_key
            .get(key)
            .cloned()
            .unwrap_or_else(|| self.fallback.lock().unwrap().clone())
    }
}

/// One recorded call: method name and key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: &'static str,
    pub key: String,
    pub token: Option<String>,
}

/// Call-recording spy.
#[derive(Default)]
pub struct CallLog(Mutex<Vec<Call>>);

impl CallLog {
    fn record(&self, method: &'static str, key: impl Into<String>, token: Option<&AccessToken>) {
        self.0.lock().unwrap().push(Call {
            method,
            key: key.into(),
            token: token.map(|t| t.expose().to_string()),
        });
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn all(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    /// Number of calls to `method`.
    #[must_use]
    pub fn count(&self, method: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Total number of calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Favorites
// =============================================================================

/// In-memory favorites backend.
#[derive(Default)]
pub struct FakeFavoritesApi {
    /// Server-side favorites.
    pub remote: Mutex<BTreeSet<ShopId>>,
    /// Behaviour of add/remove per shop.
    pub writes: Script<ShopId>,
    /// Make every fetch fail.
    pub fail_fetch: Mutex<bool>,
    pub calls: CallLog,
}

impl FakeFavoritesApi {
    #[must_use]
    pub fn with_remote<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ShopId>,
    {
        let fake = Self::default();
        fake.remote
            .lock()
            .unwrap()
            .extend(ids.into_iter().map(Into::into));
        fake
    }
}

impl FavoritesApi for FakeFavoritesApi {
    async fn fetch_favorites(&self, token: &AccessToken) -> RemoteResult<Vec<ShopId>> {
        self.calls.record("fetch_favorites", "", Some(token));
        if *self.fail_fetch.lock().unwrap() {
            return Err(RemoteError::Status {
                status: 500,
                body: "fetch failed".to_string(),
            });
        }
        Ok(self.remote.lock().unwrap().iter().cloned().collect())
    }

    async fn add_favorite(&self, token: &AccessToken, shop_id: &ShopId) -> RemoteResult<()> {
        self.calls.record("add_favorite", shop_id.as_str(), Some(token));
        let behavior = self.writes.lookup(shop_id);
        behavior.play("add_favorite").await?;
        self.remote.lock().unwrap().insert(shop_id.clone());
        Ok(())
    }

    async fn remove_favorite(&self, token: &AccessToken, shop_id: &ShopId) -> RemoteResult<()> {
        self.calls
            .record("remove_favorite", shop_id.as_str(), Some(token));
        let behavior = self.writes.lookup(shop_id);
        behavior.play("remove_favorite").await?;
        self.remote.lock().unwrap().remove(shop_id);
        Ok(())
    }
}

// =============================================================================
// Reviews
// =============================================================================

/// In-memory reviews backend.
#[derive(Default)]
pub struct FakeReviewsApi {
    /// Server-side reviews per shop, in server order.
    pub shops: Mutex<HashMap<ShopId, Vec<Review>>>,
    /// Server-side reviews per author.
    pub users: Mutex<HashMap<UserId, Vec<Review>>>,
    /// Behaviour of shop list fetches per shop.
    pub fetch: Script<ShopId>,
    /// Behaviour of like/unlike per review.
    pub likes: Script<ReviewId>,
    /// Behaviour of review creation.
    pub create: Script<ShopId>,
    /// Number of slots to issue instead of the requested count.
    pub slot_count: Mutex<Option<usize>>,
    /// Sort order of every shop fetch, in order.
    pub sorts: Mutex<Vec<ReviewSortOrder>>,
    /// Attachments referenced by every create, in order.
    pub created_with: Mutex<Vec<Vec<FileId>>>,
    next_id: AtomicUsize,
    pub calls: CallLog,
}

impl FakeReviewsApi {
    /// Seed one shop's server-side list.
    #[must_use]
    pub fn with_shop(self, shop_id: &str, reviews: Vec<Review>) -> Self {
        self.shops
            .lock()
            .unwrap()
            .insert(ShopId::new(shop_id), reviews);
        self
    }

    /// Seed one author's server-side list.
    #[must_use]
    pub fn with_user(self, user_id: &str, reviews: Vec<Review>) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(UserId::new(user_id), reviews);
        self
    }

    fn set_remote_liked(&self, review_id: &ReviewId, liked: bool) {
        let mut shops = self.shops.lock().unwrap();
        shops
            .values_mut()
            .flatten()
            .filter(|r| &r.id == review_id)
            .for_each(|r| r.set_liked(liked));
    }
}

impl ReviewsApi for FakeReviewsApi {
    async fn fetch_shop_reviews(
        &self,
        token: Option<&AccessToken>,
        shop_id: &ShopId,
        sort: ReviewSortOrder,
    ) -> RemoteResult<Vec<Review>> {
        self.calls
            .record("fetch_shop_reviews", shop_id.as_str(), token);
        self.sorts.lock().unwrap().push(sort);
        let behavior = self.fetch.lookup(shop_id);
        behavior.play("fetch_shop_reviews").await?;
        Ok(self
            .shops
            .lock()
            .unwrap()
            .get(shop_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_user_reviews(
        &self,
        token: &AccessToken,
        user_id: &UserId,
    ) -> RemoteResult<Vec<Review>> {
        self.calls
            .record("fetch_user_reviews", user_id.as_str(), Some(token));
        Ok(self
            .users
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_review(
        &self,
        token: &AccessToken,
        shop_id: &ShopId,
        input: &ReviewInput,
        attachments: &[FileId],
    ) -> RemoteResult<Review> {
        self.calls
            .record("create_review", shop_id.as_str(), Some(token));
        self.created_with
            .lock()
            .unwrap()
            .push(attachments.to_vec());
        let behavior = self.create.lookup(shop_id);
        behavior.play("create_review").await?;

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut review = Review::new(
            ReviewId::new(format!("created-{n}")),
            shop_id.clone(),
            UserId::new("me"),
            input.rating,
            input.content.clone(),
            fixed_time(),
        );
        review.attachments = attachments.to_vec();

        self.shops
            .lock()
            .unwrap()
            .entry(shop_id.clone())
            .or_default()
            .insert(0, review.clone());
        Ok(review)
    }

    async fn like_review(&self, token: &AccessToken, review_id: &ReviewId) -> RemoteResult<()> {
        self.calls
            .record("like_review", review_id.as_str(), Some(token));
        let behavior = self.likes.lookup(review_id);
        behavior.play("like_review").await?;
        self.set_remote_liked(review_id, true);
        Ok(())
    }

    async fn unlike_review(&self, token: &AccessToken, review_id: &ReviewId) -> RemoteResult<()> {
        self.calls
            .record("unlike_review", review_id.as_str(), Some(token));
        let behavior = self.likes.lookup(review_id);
        behavior.play("unlike_review").await?;
        self.set_remote_liked(review_id, false);
        Ok(())
    }

    async fn request_upload_slots(
        &self,
        token: &AccessToken,
        shop_id: &ShopId,
        count: usize,
    ) -> RemoteResult<Vec<UploadSlot>> {
        self.calls
            .record("request_upload_slots", shop_id.as_str(), Some(token));
        let issued = self.slot_count.lock().unwrap().unwrap_or(count);
        Ok((0..issued)
            .map(|i| {
                UploadSlot::new(
                    format!("reviews/{shop_id}/upload-{i}"),
                    format!("signed-{i}"),
                )
            })
            .collect())
    }
}

// =============================================================================
// Storage
// =============================================================================

/// In-memory object storage.
#[derive(Default)]
pub struct FakeStorage {
    /// Behaviour per slot path.
    pub script: Script<String>,
    /// Paths stored so far, in completion order.
    pub stored: Mutex<Vec<String>>,
    /// Uploads started but not yet finished.
    pub in_flight: AtomicUsize,
    /// Highest number of uploads in flight at once.
    pub max_in_flight: AtomicUsize,
    pub calls: CallLog,
}

impl FakeStorage {
    /// Paths that were stored.
    #[must_use]
    pub fn stored_paths(&self) -> HashSet<String> {
        self.stored.lock().unwrap().iter().cloned().collect()
    }
}

impl StorageClient for FakeStorage {
    async fn upload(&self, slot: &UploadSlot, attachment: &Attachment) -> RemoteResult<()> {
        self.calls.record("upload", slot.path.as_str(), None);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let behavior = self.script.lookup(&slot.path);
        let result = behavior.play(&attachment.file_name).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        result?;
        self.stored.lock().unwrap().push(slot.path.clone());
        Ok(())
    }
}

// =============================================================================
// Auth and identity
// =============================================================================

/// Resolver that always proceeds with `token`, counting its calls.
#[must_use]
pub fn proceed_with(token: &str, resolutions: Arc<AtomicUsize>) -> Arc<dyn AuthResolver> {
    let token = AccessToken::new(token);
    Arc::new(move || {
        resolutions.fetch_add(1, Ordering::SeqCst);
        AuthOutcome::Proceed(token.clone())
    })
}

/// Resolver that always proceeds with the token `"test-token"`.
#[must_use]
pub fn proceed() -> Arc<dyn AuthResolver> {
    proceed_with("test-token", Arc::new(AtomicUsize::new(0)))
}

/// Resolver that always skips the backend.
#[must_use]
pub fn skipped() -> Arc<dyn AuthResolver> {
    Arc::new(|| AuthOutcome::Skipped)
}

/// Identity signed in as `user_id` with the token `"test-token"`.
#[must_use]
pub fn signed_in(user_id: &str) -> Arc<SessionIdentity> {
    Arc::new(SessionIdentity::signed_in(Session {
        access_token: AccessToken::new("test-token"),
        user_id: UserId::new(user_id),
    }))
}

// =============================================================================
// Fixtures
// =============================================================================

fn fixed_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// A review of `shop_id` with the given like state.
#[must_use]
pub fn review(id: &str, shop_id: &str, liked_by_me: bool, likes_count: u32) -> Review {
    Review::new(
        ReviewId::new(id),
        ShopId::new(shop_id),
        UserId::new("author"),
        4,
        format!("Review {id}"),
        fixed_time(),
    )
    .with_likes(liked_by_me, likes_count)
}

/// An image attachment of `size` bytes.
#[must_use]
pub fn photo(name: &str, size: usize) -> Attachment {
    Attachment::new(name, "image/jpeg", vec![0xff; size])
}
