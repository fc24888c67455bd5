//! Error types for favorites and reviews operations.

use shop_scout_core::{Review, ReviewId};
use thiserror::Error;

use crate::remote::RemoteError;

/// Errors surfaced by the favorites and reviews features.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The operation needs a signed-in viewer and there is none.
    ///
    /// Raised before any state is touched.
    #[error("Authentication required")]
    AuthRequired,

    /// A backend call failed. Any optimistic change has already been rolled back.
    #[error("Remote call failed: {0}")]
    Remote(#[from] RemoteError),

    /// The backend issued a different number of upload slots than requested.
    #[error("Upload slot count mismatch: requested {expected}, received {received}")]
    UploadCountMismatch { expected: usize, received: usize },

    /// Uploading one attachment failed.
    #[error("Upload of attachment {index} failed: {source}")]
    Upload {
        index: usize,
        #[source]
        source: RemoteError,
    },

    /// The review is not in local state.
    #[error("Review not found: {0}")]
    ReviewNotFound(ReviewId),

    /// The review was created, but reloading its shop's list failed.
    ///
    /// The review exists on the backend. Creating it again would duplicate it.
    #[error("Review {} created but reloading its shop failed: {source}", .review.id)]
    ReloadFailed {
        review: Box<Review>,
        #[source]
        source: RemoteError,
    },
}

impl SyncError {
    /// Whether the caller should prompt the viewer to sign in.
    #[must_use]
    pub const fn is_auth_required(&self) -> bool {
        matches!(self, Self::AuthRequired)
    }

    /// Whether retrying the same operation later could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(e) | Self::Upload { source: e, .. } => e.is_retryable(),
            Self::AuthRequired
            | Self::UploadCountMismatch { .. }
            | Self::ReviewNotFound(_)
            | Self::ReloadFailed { .. } => false,
        }
    }

    /// The review a create produced, if this error came after it.
    #[must_use]
    pub fn created_review(&self) -> Option<&Review> {
        match self {
            Self::ReloadFailed { review, .. } => Some(review.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias for feature operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use shop_scout_core::{ShopId, UserId};

    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::UploadCountMismatch {
            expected: 2,
            received: 1,
        };
        assert_eq!(
            err.to_string(),
            "Upload slot count mismatch: requested 2, received 1"
        );

        let err = SyncError::ReviewNotFound(ReviewId::new("r9"));
        assert_eq!(err.to_string(), "Review not found: r9");
    }

    #[test]
    fn test_auth_required_helper() {
        assert!(SyncError::AuthRequired.is_auth_required());
        assert!(!SyncError::Remote(RemoteError::MissingToken).is_auth_required());
    }

    #[test]
    fn test_retryable_follows_remote_error() {
        assert!(SyncError::Remote(RemoteError::RateLimited(5)).is_retryable());
        assert!(
            SyncError::Upload {
                index: 1,
                source: RemoteError::Status {
                    status: 503,
                    body: String::new(),
                },
            }
            .is_retryable()
        );
        assert!(!SyncError::AuthRequired.is_retryable());
    }

    #[test]
    fn test_reload_failure_carries_created_review() {
        let review = Review::new(
            ReviewId::new("r7"),
            ShopId::new("s1"),
            UserId::new("me"),
            5,
            "Lovely",
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        );
        let err = SyncError::ReloadFailed {
            review: Box::new(review),
            source: RemoteError::RateLimited(2),
        };

        assert_eq!(err.created_review().map(|r| r.id.as_str()), Some("r7"));
        // Retrying the create would duplicate the review
        assert!(!err.is_retryable());
        assert!(err.to_string().starts_with("Review r7 created"));
        assert!(SyncError::AuthRequired.created_review().is_none());
    }
}
