//! Auth Gateway
//! Mission: Sign users in and out, keeping the session store authoritative

use crate::auth::identity::IdentityService;
use crate::auth::models::{SessionState, User};
use crate::auth::session_store::SessionStore;
use crate::error::AuthError;
use std::sync::Arc;
use tracing::{info, warn};

/// Thin wrapper over the identity service. Provider errors pass through unchanged.
#[derive(Clone)]
pub struct AuthGateway {
    identity: Arc<dyn IdentityService>,
    store: Arc<SessionStore>,
}

impl AuthGateway {
    pub fn new(identity: Arc<dyn IdentityService>, store: Arc<SessionStore>) -> Self {
        Self { identity, store }
    }

    /// Sign in and push the new session into the store before returning.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        info!("🔐 Login attempt: {}", email);

        let response = self.identity.sign_in(email, password).await.map_err(|e| {
            warn!("❌ Failed login attempt: {} ({})", email, e);
            e
        })?;

        let state = match response.session {
            Some(session) => SessionState::from_session(Some(session)),
            None => SessionState {
                user: Some(response.user.clone()),
                session: None,
            },
        };
        self.store.apply(state);

        info!("✅ Login successful: {}", response.user.display_name());
        Ok(response.user)
    }

    /// Create an account. Does not sign the new user in.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<User, AuthError> {
        let response = self.identity.sign_up(email, password, username).await?;
        info!("✅ Account created: {} ({})", username, email);
        Ok(response.user)
    }

    /// Sign out and clear the store without waiting for the change hook.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.identity.sign_out().await?;
        self.store.apply(SessionState::signed_out());
        info!("👋 Logged out");
        Ok(())
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.store
    }
}
