//! Reviews commands.

use std::path::{Path, PathBuf};

use shop_scout_client::{MutationOutcome, SyncError};
use shop_scout_core::{Attachment, Review, ReviewId, ReviewInput, ReviewSortOrder, ShopId};
use tracing::{info, warn};

use super::Context;

/// List `shop_id`'s reviews in `sort` order.
///
/// # Errors
///
/// Returns an error if the ID is empty or the reviews cannot be fetched.
pub async fn list(
    ctx: &Context,
    shop_id: &str,
    sort: ReviewSortOrder,
) -> Result<(), Box<dyn std::error::Error>> {
    let shop_id = ShopId::parse(shop_id)?;
    let reviews = ctx.reviews();
    reviews.load_reviews(&shop_id, sort).await?;

    let list = reviews.get_reviews(&shop_id);
    if list.is_empty() {
        info!(shop_id = %shop_id, "No reviews yet");
    }
    list.iter().for_each(log_review);
    Ok(())
}

/// List the signed-in user's reviews.
///
/// # Errors
///
/// Returns an error if the reviews cannot be fetched.
pub async fn mine(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let reviews = ctx.reviews();
    reviews.load_user_reviews().await?;

    let list = reviews.user_reviews();
    if list.is_empty() {
        info!("No reviews written");
    }
    list.iter().for_each(log_review);
    Ok(())
}

/// Like `review_id`, or unlike it if the viewer already does.
///
/// # Errors
///
/// Returns an error if the review is not in the shop's list or the backend
/// refuses the change.
pub async fn like(
    ctx: &Context,
    shop_id: &str,
    review_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let shop_id = ShopId::parse(shop_id)?;
    let review_id = ReviewId::parse(review_id)?;
    let reviews = ctx.reviews();

    reviews
        .load_reviews(&shop_id, ReviewSortOrder::default())
        .await?;
    let outcome = reviews.toggle_like(&shop_id, &review_id).await?;

    let liked = reviews.is_review_liked(&review_id);
    let likes = reviews.get_review_likes_count(&review_id);
    match outcome {
        MutationOutcome::Confirmed => info!(review_id = %review_id, liked, likes, "Saved"),
        MutationOutcome::AppliedLocally => {
            info!(review_id = %review_id, liked, likes, "Applied locally");
        }
        MutationOutcome::Deduplicated => info!(review_id = %review_id, "Already in progress"),
    }
    Ok(())
}

/// Write a review, uploading `attach` first.
///
/// # Errors
///
/// Returns an error if a file cannot be read, the viewer is not signed in,
/// or any backend step fails.
pub async fn add(
    ctx: &Context,
    shop_id: &str,
    rating: u8,
    content: String,
    attach: &[PathBuf],
) -> Result<(), Box<dyn std::error::Error>> {
    let shop_id = ShopId::parse(shop_id)?;

    let mut attachments = Vec::with_capacity(attach.len());
    for path in attach {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "attachment".to_string(), |n| n.to_string_lossy().into_owned());
        info!(file = %file_name, bytes = bytes.len(), "Read attachment");
        attachments.push(Attachment::new(file_name, content_type_for(path), bytes));
    }

    let reviews = ctx.reviews();
    let review = match reviews
        .add_review(&shop_id, ReviewInput { rating, content }, attachments)
        .await
    {
        Ok(review) => review,
        // Published already; the list is stale but the command succeeded
        Err(SyncError::ReloadFailed { review, source }) => {
            warn!(error = %source, "Could not refresh the shop's reviews");
            *review
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        review_id = %review.id,
        attachments = review.attachments.len(),
        "Review published"
    );
    Ok(())
}

fn log_review(review: &Review) {
    info!(
        review_id = %review.id,
        author = review.author_name.as_deref().unwrap_or("anonymous"),
        rating = review.rating,
        likes = review.likes_count(),
        liked = review.liked_by_me(),
        attachments = review.attachments.len(),
        "{}",
        review.content
    );
}

/// Guess a MIME type from the file extension.
fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}
