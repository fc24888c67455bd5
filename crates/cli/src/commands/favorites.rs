//! Favorites commands.

use shop_scout_client::MutationOutcome;
use shop_scout_core::ShopId;
use tracing::info;

use super::Context;

/// List favorite shops.
///
/// # Errors
///
/// Returns an error if the favorites cannot be fetched.
pub async fn list(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let favorites = ctx.favorites();
    favorites.load_favorites().await?;

    let set = favorites.favorites();
    if set.is_empty() {
        info!("No favorite shops");
        return Ok(());
    }
    for shop_id in set.iter() {
        info!(shop_id = %shop_id, "Favorite");
    }
    info!(count = set.len(), "Listed favorites");
    Ok(())
}

/// Favorite `shop_id`, or unfavorite it if it already is one.
///
/// # Errors
///
/// Returns an error if the ID is empty or the backend refuses the change.
pub async fn toggle(ctx: &Context, shop_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let shop_id = ShopId::parse(shop_id)?;
    let favorites = ctx.favorites();

    // Membership decides which half of the toggle runs
    favorites.load_favorites().await?;

    let outcome = favorites.toggle_favorite(shop_id.clone()).await?;
    let now_favorite = favorites.is_favorite(&shop_id);

    match outcome {
        MutationOutcome::Confirmed => info!(shop_id = %shop_id, now_favorite, "Saved"),
        MutationOutcome::AppliedLocally => {
            info!(shop_id = %shop_id, now_favorite, "Applied locally");
        }
        MutationOutcome::Deduplicated => info!(shop_id = %shop_id, "Already in progress"),
    }
    Ok(())
}
