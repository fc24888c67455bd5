//! Shop Scout client library.
//!
//! Client-side state for the two features that change remote data: favorite
//! shops and shop reviews. Both are built on a small optimistic mutation core
//! that applies a change immediately, reconciles it against the backend, and
//! rolls it back if the backend refuses.
//!
//! # Architecture
//!
//! - [`sync`] - Generic mutation core: state store, pending-key tracker,
//!   auth resolution, executor and toggle factory
//! - [`favorites`] - Favorite shops, optimistic toggle plus full refresh
//! - [`reviews`] - Per-shop reviews, optimistic likes, non-optimistic creation
//! - [`remote`] - Collaborator traits and the reqwest-backed [`remote::ApiClient`]
//! - [`identity`] - Access tokens and the session-backed identity provider
//! - [`config`] - Environment configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shop_scout_client::{ApiClient, ClientConfig, FavoritesDeps, FavoritesState, SessionAuth, SessionIdentity};
//!
//! let config = ClientConfig::from_env()?;
//! let api = Arc::new(ApiClient::new(&config)?);
//! let identity = Arc::new(SessionIdentity::from_config(&config));
//! let auth = Arc::new(SessionAuth::new(identity, config.demo_mode));
//!
//! let favorites = FavoritesState::new(FavoritesDeps { api, auth });
//! favorites.load_favorites().await?;
//! favorites.toggle_favorite("shop-1".into()).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod favorites;
pub mod identity;
pub mod remote;
pub mod reviews;
pub mod sync;

pub use config::{ClientConfig, ConfigError};
pub use error::SyncError;
pub use favorites::{FavoriteSet, FavoritesDeps, FavoritesState};
pub use identity::{AccessToken, IdentityProvider, Session, SessionIdentity};
pub use remote::{ApiClient, FavoritesApi, RemoteError, ReviewsApi, StorageClient};
pub use reviews::{ReviewBook, ReviewsDeps, ReviewsState};
pub use sync::{
    AuthOutcome, AuthResolver, Mutation, MutationExecutor, MutationOutcome, PendingKeys,
    SessionAuth, StateStore, ToggleOperation, TogglePair, ToggleTemplate,
};
