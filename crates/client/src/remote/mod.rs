//! Backend collaborators.
//!
//! The favorites and reviews features never talk to the network directly.
//! They are constructed with implementations of the traits below, which makes
//! every collaborator substitutable in tests.
//!
//! # Implementations
//!
//! - [`ApiClient`] - REST/JSON backend over `reqwest`, implements all three
//!   traits. Per-shop review lists are cached with `moka` and invalidated on
//!   any review write.

mod http;

pub use http::ApiClient;

use std::future::Future;

use shop_scout_core::{
    Attachment, FileId, Review, ReviewId, ReviewInput, ReviewSortOrder, ShopId, UploadSlot, UserId,
};
use thiserror::Error;

use crate::identity::AccessToken;

/// Errors that can occur when calling the backend.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// First part of the response body.
        body: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The call needs a bearer token and none was resolved.
    #[error("Missing access token")]
    MissingToken,

    /// The collaborator refused the call for a reason of its own.
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl RemoteError {
    /// Whether retrying the same call later could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => *status >= 500,
            Self::RateLimited(_) => true,
            Self::Parse(_) | Self::MissingToken | Self::Rejected(_) => false,
        }
    }
}

/// Result type alias for backend calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Remote favorites for the signed-in user.
pub trait FavoritesApi: Send + Sync {
    /// Fetch every favorited shop ID.
    fn fetch_favorites(
        &self,
        token: &AccessToken,
    ) -> impl Future<Output = RemoteResult<Vec<ShopId>>> + Send;

    /// Favorite one shop.
    fn add_favorite(
        &self,
        token: &AccessToken,
        shop_id: &ShopId,
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Unfavorite one shop.
    fn remove_favorite(
        &self,
        token: &AccessToken,
        shop_id: &ShopId,
    ) -> impl Future<Output = RemoteResult<()>> + Send;
}

/// Remote reviews.
pub trait ReviewsApi: Send + Sync {
    /// Fetch a shop's reviews. The token, when present, lets the backend fill
    /// in the viewer's like flags.
    fn fetch_shop_reviews(
        &self,
        token: Option<&AccessToken>,
        shop_id: &ShopId,
        sort: ReviewSortOrder,
    ) -> impl Future<Output = RemoteResult<Vec<Review>>> + Send;

    /// Fetch every review written by `user_id`.
    fn fetch_user_reviews(
        &self,
        token: &AccessToken,
        user_id: &UserId,
    ) -> impl Future<Output = RemoteResult<Vec<Review>>> + Send;

    /// Create a review referencing already-uploaded attachments.
    fn create_review(
        &self,
        token: &AccessToken,
        shop_id: &ShopId,
        input: &ReviewInput,
        attachments: &[FileId],
    ) -> impl Future<Output = RemoteResult<Review>> + Send;

    /// Like a review as the signed-in user.
    fn like_review(
        &self,
        token: &AccessToken,
        review_id: &ReviewId,
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Remove the signed-in user's like.
    fn unlike_review(
        &self,
        token: &AccessToken,
        review_id: &ReviewId,
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Request `count` signed upload slots for attachments to a review of `shop_id`.
    fn request_upload_slots(
        &self,
        token: &AccessToken,
        shop_id: &ShopId,
        count: usize,
    ) -> impl Future<Output = RemoteResult<Vec<UploadSlot>>> + Send;
}

/// Object storage accepting uploads to signed slots.
pub trait StorageClient: Send + Sync {
    /// Upload `attachment` to `slot`.
    fn upload(
        &self,
        slot: &UploadSlot,
        attachment: &Attachment,
    ) -> impl Future<Output = RemoteResult<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let err = RemoteError::Status {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: unavailable");

        let err = RemoteError::RateLimited(30);
        assert_eq!(err.to_string(), "Rate limited, retry after 30 seconds");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(
            RemoteError::Status {
                status: 502,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(
            !RemoteError::Status {
                status: 404,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(RemoteError::RateLimited(1).is_retryable());
        assert!(!RemoteError::MissingToken.is_retryable());
        assert!(!RemoteError::Rejected("no".to_string()).is_retryable());
    }
}
