//! REST/JSON backend client.
//!
//! Uses `reqwest` for HTTP. Caches per-shop review lists using `moka`; any
//! review write clears the cache so reloads after a write see server truth.

mod cache;
mod conversions;

use std::sync::Arc;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use shop_scout_core::{
    Attachment, FileId, Review, ReviewId, ReviewInput, ReviewSortOrder, ShopId, UploadSlot, UserId,
};
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use super::{FavoritesApi, RemoteError, RemoteResult, ReviewsApi, StorageClient};
use crate::config::ClientConfig;
use crate::identity::AccessToken;

use cache::ReviewListKey;
use conversions::{
    CreateReviewBody, FavoriteBody, FavoriteRecord, ReviewRecord, UploadSlotRecord,
    UploadSlotsBody, convert_favorites, convert_review, convert_reviews, convert_upload_slots,
};

/// Longest body excerpt kept in errors and logs.
const BODY_EXCERPT_CHARS: usize = 500;

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the Shop Scout backend and its object storage.
///
/// Cheap to clone; clones share the HTTP connection pool and the cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    api_url: Url,
    storage_url: Url,
    api_key: Option<SecretString>,
    reviews: Cache<ReviewListKey, Arc<Vec<Review>>>,
}

impl ApiClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> RemoteResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        let reviews = Cache::builder()
            .max_capacity(500)
            .time_to_live(config.review_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                api_url: config.api_url.clone(),
                storage_url: config.storage_url.clone(),
                api_key: config.api_key.clone(),
                reviews,
            }),
        })
    }

    /// Build a URL under the API base from path segments.
    ///
    /// Segments are percent-encoded, so IDs can never escape their position.
    fn api_endpoint(&self, segments: &[&str]) -> Url {
        join_segments(&self.inner.api_url, segments)
    }

    fn request(&self, method: Method, url: Url, token: Option<&AccessToken>) -> RequestBuilder {
        let mut request = self
            .inner
            .client
            .request(method, url)
            .header("X-Request-Id", Uuid::new_v4().to_string());

        if let Some(key) = &self.inner.api_key {
            request = request.header("apikey", key.expose_secret());
        }
        if let Some(token) = token {
            request = request.bearer_auth(token.expose());
        }
        request
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: RequestBuilder) -> RemoteResult<String> {
        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(RemoteError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            let excerpt = excerpt(&body);
            tracing::error!(
                status = %status,
                body = %excerpt,
                "Backend returned non-success status"
            );
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: excerpt,
            });
        }

        Ok(body)
    }

    /// Send a request and parse a JSON body.
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteResult<T> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %excerpt(&body),
                "Failed to parse backend response"
            );
            RemoteError::Parse(e)
        })
    }

    /// Drop every cached review list.
    fn invalidate_reviews(&self) {
        self.inner.reviews.invalidate_all();
    }
}

fn join_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

// =============================================================================
// Favorites
// =============================================================================

impl FavoritesApi for ApiClient {
    #[instrument(skip(self, token))]
    async fn fetch_favorites(&self, token: &AccessToken) -> RemoteResult<Vec<ShopId>> {
        let url = self.api_endpoint(&["favorites"]);
        let records: Vec<FavoriteRecord> = self
            .send_json(self.request(Method::GET, url, Some(token)))
            .await?;
        Ok(convert_favorites(records))
    }

    #[instrument(skip(self, token), fields(shop_id = %shop_id))]
    async fn add_favorite(&self, token: &AccessToken, shop_id: &ShopId) -> RemoteResult<()> {
        let url = self.api_endpoint(&["favorites"]);
        let body = FavoriteBody {
            shop_id: shop_id.as_str(),
        };
        self.send(self.request(Method::POST, url, Some(token)).json(&body))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, token), fields(shop_id = %shop_id))]
    async fn remove_favorite(&self, token: &AccessToken, shop_id: &ShopId) -> RemoteResult<()> {
        let url = self.api_endpoint(&["favorites", shop_id.as_str()]);
        self.send(self.request(Method::DELETE, url, Some(token)))
            .await?;
        Ok(())
    }
}

// =============================================================================
// Reviews
// =============================================================================

impl ReviewsApi for ApiClient {
    #[instrument(skip(self, token), fields(shop_id = %shop_id, sort = %sort))]
    async fn fetch_shop_reviews(
        &self,
        token: Option<&AccessToken>,
        shop_id: &ShopId,
        sort: ReviewSortOrder,
    ) -> RemoteResult<Vec<Review>> {
        let key = ReviewListKey::new(shop_id, sort, token);

        // Check cache
        if let Some(reviews) = self.inner.reviews.get(&key).await {
            debug!("Cache hit for shop reviews");
            return Ok(reviews.as_ref().clone());
        }

        let mut url = self.api_endpoint(&["shops", shop_id.as_str(), "reviews"]);
        url.query_pairs_mut().append_pair("sort", sort.as_str());

        let records: Vec<ReviewRecord> = self
            .send_json(self.request(Method::GET, url, token))
            .await?;
        let reviews = convert_reviews(records);

        // Cache the result
        self.inner
            .reviews
            .insert(key, Arc::new(reviews.clone()))
            .await;

        Ok(reviews)
    }

    #[instrument(skip(self, token), fields(user_id = %user_id))]
    async fn fetch_user_reviews(
        &self,
        token: &AccessToken,
        user_id: &UserId,
    ) -> RemoteResult<Vec<Review>> {
        let url = self.api_endpoint(&["users", user_id.as_str(), "reviews"]);
        let records: Vec<ReviewRecord> = self
            .send_json(self.request(Method::GET, url, Some(token)))
            .await?;
        Ok(convert_reviews(records))
    }

    #[instrument(skip(self, token, input), fields(shop_id = %shop_id, attachments = attachments.len()))]
    async fn create_review(
        &self,
        token: &AccessToken,
        shop_id: &ShopId,
        input: &ReviewInput,
        attachments: &[FileId],
    ) -> RemoteResult<Review> {
        let url = self.api_endpoint(&["shops", shop_id.as_str(), "reviews"]);
        let body = CreateReviewBody {
            rating: input.rating,
            content: &input.content,
            attachments: attachments.iter().map(FileId::as_str).collect(),
        };

        let record: ReviewRecord = self
            .send_json(self.request(Method::POST, url, Some(token)).json(&body))
            .await?;
        self.invalidate_reviews();

        Ok(convert_review(record))
    }

    #[instrument(skip(self, token), fields(review_id = %review_id))]
    async fn like_review(&self, token: &AccessToken, review_id: &ReviewId) -> RemoteResult<()> {
        let url = self.api_endpoint(&["reviews", review_id.as_str(), "like"]);
        self.send(self.request(Method::POST, url, Some(token)))
            .await?;
        self.invalidate_reviews();
        Ok(())
    }

    #[instrument(skip(self, token), fields(review_id = %review_id))]
    async fn unlike_review(&self, token: &AccessToken, review_id: &ReviewId) -> RemoteResult<()> {
        let url = self.api_endpoint(&["reviews", review_id.as_str(), "like"]);
        self.send(self.request(Method::DELETE, url, Some(token)))
            .await?;
        self.invalidate_reviews();
        Ok(())
    }

    #[instrument(skip(self, token), fields(shop_id = %shop_id))]
    async fn request_upload_slots(
        &self,
        token: &AccessToken,
        shop_id: &ShopId,
        count: usize,
    ) -> RemoteResult<Vec<UploadSlot>> {
        let url = self.api_endpoint(&["shops", shop_id.as_str(), "upload-slots"]);
        let records: Vec<UploadSlotRecord> = self
            .send_json(
                self.request(Method::POST, url, Some(token))
                    .json(&UploadSlotsBody { count }),
            )
            .await?;
        Ok(convert_upload_slots(records))
    }
}

// =============================================================================
// Storage
// =============================================================================

impl StorageClient for ApiClient {
    #[instrument(skip(self, slot, attachment), fields(path = %slot.path, bytes = attachment.len()))]
    async fn upload(&self, slot: &UploadSlot, attachment: &Attachment) -> RemoteResult<()> {
        let mut segments = vec!["object", "upload", "sign"];
        segments.extend(slot.path.split('/').filter(|s| !s.is_empty()));
        let mut url = join_segments(&self.inner.storage_url, &segments);
        url.query_pairs_mut().append_pair("token", &slot.token);

        let request = self
            .request(Method::PUT, url, None)
            .header("Content-Type", &attachment.content_type)
            .body(attachment.bytes.clone());
        self.send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::from_lookup(|key| match key {
            "SHOP_SCOUT_API_URL" => Some("https://api.shopscout.test/v1".to_string()),
            "SHOP_SCOUT_STORAGE_URL" => Some("https://storage.shopscout.test/".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_appends_segments() {
        let client = ApiClient::new(&config()).unwrap();
        let url = client.api_endpoint(&["shops", "s1", "reviews"]);
        assert_eq!(url.as_str(), "https://api.shopscout.test/v1/shops/s1/reviews");
    }

    #[test]
    fn test_endpoint_escapes_ids() {
        let client = ApiClient::new(&config()).unwrap();
        let url = client.api_endpoint(&["favorites", "../admin?x=1"]);
        assert!(url.path().starts_with("/v1/favorites/"));
        assert!(url.path().contains("%2F"));
        assert!(url.query().is_none());
    }

    #[test]
    fn test_join_segments_with_trailing_slash_base() {
        let base = Url::parse("https://storage.shopscout.test/").unwrap();
        let url = join_segments(&base, &["object", "upload", "sign", "reviews", "a.jpg"]);
        assert_eq!(
            url.as_str(),
            "https://storage.shopscout.test/object/upload/sign/reviews/a.jpg"
        );
    }

    #[test]
    fn test_excerpt_truncates() {
        let body = "x".repeat(BODY_EXCERPT_CHARS + 10);
        assert_eq!(excerpt(&body).len(), BODY_EXCERPT_CHARS);
    }
}
