//! Cache types for review list responses.

use sha2::{Digest, Sha256};
use shop_scout_core::{ReviewSortOrder, ShopId};

use crate::identity::AccessToken;

/// Cache key for a shop's review list.
///
/// Like flags differ per viewer, so the key carries a SHA-256 fingerprint of
/// the viewer's token (`None` for anonymous reads). Switching accounts never
/// serves another viewer's flags.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ReviewListKey {
    pub shop_id: ShopId,
    pub sort: ReviewSortOrder,
    pub viewer: Option<[u8; 32]>,
}

impl ReviewListKey {
    #[must_use]
    pub fn new(shop_id: &ShopId, sort: ReviewSortOrder, token: Option<&AccessToken>) -> Self {
        Self {
            shop_id: shop_id.clone(),
            sort,
            viewer: token.map(|t| Sha256::digest(t.expose().as_bytes()).into()),
        }
    }
}
