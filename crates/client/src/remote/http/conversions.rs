//! Wire records and their conversion to core types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shop_scout_core::{FileId, Review, ReviewId, ShopId, UploadSlot, UserId};

/// A review row as returned by the backend.
#[derive(Debug, Deserialize)]
pub struct ReviewRecord {
    pub id: String,
    pub shop_id: String,
    pub user_id: String,
    #[serde(default)]
    pub author_name: Option<String>,
    pub rating: u8,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub liked_by_me: bool,
    #[serde(default)]
    pub likes_count: u32,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A favorite row as returned by the backend.
#[derive(Debug, Deserialize)]
pub struct FavoriteRecord {
    pub shop_id: String,
}

/// A signed upload slot as returned by the backend.
#[derive(Deserialize)]
pub struct UploadSlotRecord {
    pub path: String,
    pub token: String,
}

/// Body of `POST /favorites`.
#[derive(Debug, Serialize)]
pub struct FavoriteBody<'a> {
    pub shop_id: &'a str,
}

/// Body of `POST /shops/{shop_id}/reviews`.
#[derive(Debug, Serialize)]
pub struct CreateReviewBody<'a> {
    pub rating: u8,
    pub content: &'a str,
    pub attachments: Vec<&'a str>,
}

/// Body of `POST /shops/{shop_id}/upload-slots`.
#[derive(Debug, Serialize)]
pub struct UploadSlotsBody {
    pub count: usize,
}

pub fn convert_review(record: ReviewRecord) -> Review {
    let mut review = Review::new(
        ReviewId::new(record.id),
        ShopId::new(record.shop_id),
        UserId::new(record.user_id),
        record.rating,
        record.content,
        record.created_at,
    )
    .with_likes(record.liked_by_me, record.likes_count);
    review.author_name = record.author_name;
    review.attachments = record.attachments.into_iter().map(FileId::new).collect();
    review
}

pub fn convert_reviews(records: Vec<ReviewRecord>) -> Vec<Review> {
    records.into_iter().map(convert_review).collect()
}

pub fn convert_favorites(records: Vec<FavoriteRecord>) -> Vec<ShopId> {
    records
        .into_iter()
        .map(|r| ShopId::new(r.shop_id))
        .collect()
}

pub fn convert_upload_slots(records: Vec<UploadSlotRecord>) -> Vec<UploadSlot> {
    records
        .into_iter()
        .map(|r| UploadSlot::new(r.path, r.token))
        .collect()
}
