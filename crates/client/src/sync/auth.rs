//! Auth resolution for mutations.

use std::sync::Arc;

use tracing::debug;

use crate::identity::{AccessToken, IdentityProvider};

/// Result of resolving auth for one mutation attempt.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// No remote call: the change is accepted locally and kept.
    Skipped,
    /// Call the backend with this token.
    Proceed(AccessToken),
}

impl AuthOutcome {
    /// Whether the remote call will be skipped.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Decides, freshly on every attempt, whether a mutation goes to the backend.
///
/// Implemented for plain closures so tests can inject a fixed outcome.
pub trait AuthResolver: Send + Sync {
    /// Resolve auth for one attempt. Never cached by callers.
    fn resolve(&self) -> AuthOutcome;
}

impl<F> AuthResolver for F
where
    F: Fn() -> AuthOutcome + Send + Sync,
{
    fn resolve(&self) -> AuthOutcome {
        self()
    }
}

/// Standard resolver driven by the viewer's session.
///
/// Skips the backend in demo mode, and for anonymous viewers (their changes
/// live only as long as the feature instance). Otherwise proceeds with the
/// session's token.
pub struct SessionAuth<I> {
    identity: Arc<I>,
    demo_mode: bool,
}

impl<I: IdentityProvider> SessionAuth<I> {
    /// Create a resolver over `identity`.
    #[must_use]
    pub const fn new(identity: Arc<I>, demo_mode: bool) -> Self {
        Self {
            identity,
            demo_mode,
        }
    }

    /// The identity provider this resolver reads from.
    #[must_use]
    pub const fn identity(&self) -> &Arc<I> {
        &self.identity
    }
}

impl<I: IdentityProvider> AuthResolver for SessionAuth<I> {
    fn resolve(&self) -> AuthOutcome {
        if self.demo_mode {
            debug!("Demo mode, skipping remote call");
            return AuthOutcome::Skipped;
        }
        match self.identity.access_token() {
            Some(token) => AuthOutcome::Proceed(token),
            None => {
                debug!("No session, skipping remote call");
                AuthOutcome::Skipped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Session, SessionIdentity};
    use shop_scout_core::UserId;

    fn signed_in() -> Arc<SessionIdentity> {
        Arc::new(SessionIdentity::signed_in(Session {
            access_token: AccessToken::new("tok"),
            user_id: UserId::new("u1"),
        }))
    }

    #[test]
    fn test_demo_mode_always_skips() {
        let auth = SessionAuth::new(signed_in(), true);
        assert!(auth.resolve().is_skipped());
    }

    #[test]
    fn test_anonymous_skips() {
        let auth = SessionAuth::new(Arc::new(SessionIdentity::anonymous()), false);
        assert!(auth.resolve().is_skipped());
    }

    #[test]
    fn test_signed_in_proceeds_with_token() {
        let auth = SessionAuth::new(signed_in(), false);
        match auth.resolve() {
            AuthOutcome::Proceed(token) => assert_eq!(token.expose(), "tok"),
            AuthOutcome::Skipped => panic!("expected Proceed"),
        }
    }

    #[test]
    fn test_resolved_fresh_each_time() {
        let identity = signed_in();
        let auth = SessionAuth::new(Arc::clone(&identity), false);
        assert!(!auth.resolve().is_skipped());

        identity.sign_out();
        assert!(auth.resolve().is_skipped());
    }

    #[test]
    fn test_closure_resolver() {
        let auth: Arc<dyn AuthResolver> = Arc::new(|| AuthOutcome::Skipped);
        assert!(auth.resolve().is_skipped());
    }
}
