//! Identity Service Contract
//! Mission: Abstract the hosted identity provider behind one async trait

use crate::auth::models::{IdentityEvent, Session, User};
use crate::error::AuthError;
use async_trait::async_trait;
use std::sync::Arc;

/// Callback fired on out-of-band identity changes (expiry, external sign-out)
pub type IdentityChangeCallback = Arc<dyn Fn(IdentityEvent, Option<Session>) + Send + Sync>;

/// Result of a sign-in or sign-up call
#[derive(Debug, Clone)]
pub struct AuthResponse {
    pub user: User,
    /// Absent when the provider requires email confirmation before login
    pub session: Option<Session>,
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Session persisted by the provider, if any. Errors mean the provider is unreachable.
    async fn get_current_session(&self) -> Result<Option<Session>, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<AuthResponse, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Register a long-lived listener for identity changes.
    fn on_identity_change(&self, callback: IdentityChangeCallback);
}
