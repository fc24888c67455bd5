//! CLI command implementations.

pub mod favorites;
pub mod reviews;

use std::sync::Arc;

use shop_scout_client::{
    ApiClient, AuthResolver, ClientConfig, FavoritesDeps, FavoritesState, RemoteError,
    ReviewsDeps, ReviewsState, SessionAuth, SessionIdentity,
};
use tracing::info;

/// Collaborators shared by every command.
pub struct Context {
    api: Arc<ApiClient>,
    identity: Arc<SessionIdentity>,
    auth: Arc<dyn AuthResolver>,
}

impl Context {
    /// Build the backend client and session from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, RemoteError> {
        let api = Arc::new(ApiClient::new(config)?);
        let identity = Arc::new(SessionIdentity::from_config(config));

        if config.demo_mode {
            info!("Demo mode: changes stay local");
        } else if !identity.is_signed_in() {
            info!("No session configured: changes stay local");
        }

        let auth: Arc<dyn AuthResolver> =
            Arc::new(SessionAuth::new(Arc::clone(&identity), config.demo_mode));

        Ok(Self {
            api,
            identity,
            auth,
        })
    }

    pub fn favorites(&self) -> FavoritesState<ApiClient> {
        FavoritesState::new(FavoritesDeps {
            api: Arc::clone(&self.api),
            auth: Arc::clone(&self.auth),
        })
    }

    pub fn reviews(&self) -> ReviewsState<ApiClient, ApiClient, SessionIdentity> {
        ReviewsState::new(ReviewsDeps {
            api: Arc::clone(&self.api),
            storage: Arc::clone(&self.api),
            identity: Arc::clone(&self.identity),
            auth: Arc::clone(&self.auth),
        })
    }
}
