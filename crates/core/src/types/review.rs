//! Review entity and review submission input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{FileId, ReviewId, ShopId, UserId};

/// A review of a shop as seen by the current viewer.
///
/// `liked_by_me` and `likes_count` describe the same fact from two angles,
/// so they are only ever changed together through [`Review::set_liked`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Review identifier.
    pub id: ReviewId,
    /// Shop the review belongs to.
    pub shop_id: ShopId,
    /// Author of the review.
    pub author_id: UserId,
    /// Display name of the author, if the backend exposes one.
    pub author_name: Option<String>,
    /// Star rating (1-5).
    pub rating: u8,
    /// Free-form review text.
    pub content: String,
    /// Whether the current viewer has liked this review.
    liked_by_me: bool,
    /// Number of likes across all viewers.
    likes_count: u32,
    /// Uploaded attachment identifiers, in submission order.
    #[serde(default)]
    pub attachments: Vec<FileId>,
    /// When the review was created.
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Create a review with the given like state.
    #[must_use]
    pub fn new(
        id: ReviewId,
        shop_id: ShopId,
        author_id: UserId,
        rating: u8,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            shop_id,
            author_id,
            author_name: None,
            rating,
            content: content.into(),
            liked_by_me: false,
            likes_count: 0,
            attachments: Vec::new(),
            created_at,
        }
    }

    /// Builder-style setter for the like state.
    #[must_use]
    pub const fn with_likes(mut self, liked_by_me: bool, likes_count: u32) -> Self {
        self.liked_by_me = liked_by_me;
        self.likes_count = likes_count;
        self
    }

    /// Whether the current viewer has liked this review.
    #[must_use]
    pub const fn liked_by_me(&self) -> bool {
        self.liked_by_me
    }

    /// Number of likes.
    #[must_use]
    pub const fn likes_count(&self) -> u32 {
        self.likes_count
    }

    /// Set the viewer's like flag, adjusting the count by one.
    ///
    /// Setting the flag to its current value changes nothing. The count never
    /// drops below zero.
    pub const fn set_liked(&mut self, liked: bool) {
        if self.liked_by_me == liked {
            return;
        }
        self.liked_by_me = liked;
        self.likes_count = if liked {
            self.likes_count.saturating_add(1)
        } else {
            self.likes_count.saturating_sub(1)
        };
    }
}

/// User-provided fields for a new review.
///
/// Attachments are passed separately because they are uploaded before the
/// review itself is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewInput {
    /// Star rating (1-5).
    pub rating: u8,
    /// Free-form review text.
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(liked: bool, count: u32) -> Review {
        Review::new(
            ReviewId::new("r1"),
            ShopId::new("s1"),
            UserId::new("u1"),
            4,
            "Great coffee",
            DateTime::<Utc>::UNIX_EPOCH,
        )
        .with_likes(liked, count)
    }

    #[test]
    fn test_set_liked_increments() {
        let mut r = review(false, 5);
        r.set_liked(true);
        assert!(r.liked_by_me());
        assert_eq!(r.likes_count(), 6);
    }

    #[test]
    fn test_set_liked_decrements() {
        let mut r = review(true, 6);
        r.set_liked(false);
        assert!(!r.liked_by_me());
        assert_eq!(r.likes_count(), 5);
    }

    #[test]
    fn test_set_liked_same_value_is_noop() {
        let mut r = review(true, 3);
        r.set_liked(true);
        assert_eq!(r.likes_count(), 3);
    }

    #[test]
    fn test_unlike_never_underflows() {
        // Backend data can be inconsistent (liked but zero count)
        let mut r = review(true, 0);
        r.set_liked(false);
        assert_eq!(r.likes_count(), 0);
    }
}
