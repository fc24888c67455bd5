//! Access tokens and identity providers.
//!
//! The mutation core never stores credentials itself. It asks an
//! [`IdentityProvider`] for the current token on every attempt, because the
//! user can sign in or out between two calls.

use std::sync::{PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use shop_scout_core::UserId;
use tracing::info;

use crate::config::ClientConfig;

/// Bearer token for authenticated backend calls.
///
/// Wraps a `SecretString` so the value never appears in `Debug` output or logs.
#[derive(Debug, Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    /// Wrap a raw token value.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Expose the raw token for use in an `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl From<SecretString> for AccessToken {
    fn from(secret: SecretString) -> Self {
        Self(secret)
    }
}

/// Source of the current viewer's identity.
pub trait IdentityProvider: Send + Sync {
    /// Current access token, if the viewer is signed in.
    fn access_token(&self) -> Option<AccessToken>;

    /// Current user identifier, if the viewer is signed in.
    fn user_id(&self) -> Option<UserId>;
}

/// A signed-in session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Bearer token for backend calls.
    pub access_token: AccessToken,
    /// Identifier of the signed-in user.
    pub user_id: UserId,
}

/// Identity provider backed by an in-memory session that can change at runtime.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    session: RwLock<Option<Session>>,
}

impl SessionIdentity {
    /// Create a provider with no signed-in user.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Create a provider that starts signed in.
    #[must_use]
    pub fn signed_in(session: Session) -> Self {
        Self {
            session: RwLock::new(Some(session)),
        }
    }

    /// Build the provider from configuration.
    ///
    /// The viewer is signed in only when both an access token and a user ID
    /// are configured.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        match (&config.access_token, &config.user_id) {
            (Some(token), Some(user_id)) => Self::signed_in(Session {
                access_token: AccessToken::from(token.clone()),
                user_id: user_id.clone(),
            }),
            _ => Self::anonymous(),
        }
    }

    /// Replace the current session.
    pub fn sign_in(&self, session: Session) {
        info!(user_id = %session.user_id, "Signed in");
        *self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    /// Drop the current session.
    pub fn sign_out(&self) {
        let previous = self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = previous {
            info!(user_id = %session.user_id, "Signed out");
        }
    }

    /// Whether a session is present.
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl IdentityProvider for SessionIdentity {
    fn access_token(&self) -> Option<AccessToken> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    fn user_id(&self) -> Option<UserId> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.user_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            access_token: AccessToken::new("tok_abc"),
            user_id: UserId::new("user-1"),
        }
    }

    #[test]
    fn test_access_token_debug_redacts() {
        let token = AccessToken::new("super_secret_bearer");
        let debug_output = format!("{token:?}");
        assert!(!debug_output.contains("super_secret_bearer"));
    }

    #[test]
    fn test_anonymous_has_no_identity() {
        let identity = SessionIdentity::anonymous();
        assert!(identity.access_token().is_none());
        assert!(identity.user_id().is_none());
        assert!(!identity.is_signed_in());
    }

    #[test]
    fn test_sign_in_then_out() {
        let identity = SessionIdentity::anonymous();
        identity.sign_in(session());
        assert_eq!(
            identity.access_token().map(|t| t.expose().to_string()),
            Some("tok_abc".to_string())
        );
        assert_eq!(identity.user_id(), Some(UserId::new("user-1")));

        identity.sign_out();
        assert!(identity.access_token().is_none());
    }

    #[test]
    fn test_token_read_fresh_after_change() {
        let identity = SessionIdentity::signed_in(session());
        identity.sign_in(Session {
            access_token: AccessToken::new("tok_new"),
            user_id: UserId::new("user-1"),
        });
        assert_eq!(
            identity.access_token().map(|t| t.expose().to_string()),
            Some("tok_new".to_string())
        );
    }
}
