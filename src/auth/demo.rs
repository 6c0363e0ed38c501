//! Demo Identity Service
//! Mission: Let the dashboard run without a hosted backend
//!
//! Every credential is accepted and resolves to the same demo account.

use crate::auth::identity::{AuthResponse, IdentityChangeCallback, IdentityService};
use crate::auth::models::{IdentityEvent, Session, User, UserMetadata};
use crate::error::AuthError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Delay before the provider reports its state to a freshly registered hook
const INITIAL_EVENT_DELAY: Duration = Duration::from_millis(100);

pub struct DemoIdentity {
    current: Arc<Mutex<Option<Session>>>,
    callbacks: Arc<Mutex<Vec<IdentityChangeCallback>>>,
}

impl DemoIdentity {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(None)),
            callbacks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn demo_user() -> User {
        User {
            id: "demo".to_string(),
            email: Some("demo@gecr.com".to_string()),
            user_metadata: UserMetadata::default(),
        }
    }

    fn demo_session() -> Session {
        Session {
            access_token: "demo-access-token".to_string(),
            refresh_token: None,
            expires_at: None,
            user: Self::demo_user(),
        }
    }

    fn emit(&self, event: IdentityEvent) {
        let session = self.current.lock().clone();
        let callbacks: Vec<_> = self.callbacks.lock().clone();
        for callback in callbacks {
            callback(event, session.clone());
        }
    }
}

impl Default for DemoIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityService for DemoIdentity {
    async fn get_current_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.current.lock().clone())
    }

    async fn sign_in(&self, email: &str, _password: &str) -> Result<AuthResponse, AuthError> {
        debug!("Demo sign-in for {}", email);
        let session = Self::demo_session();
        *self.current.lock() = Some(session.clone());
        self.emit(IdentityEvent::SignedIn);
        Ok(AuthResponse {
            user: session.user.clone(),
            session: Some(session),
        })
    }

    async fn sign_up(
        &self,
        _email: &str,
        _password: &str,
        _username: &str,
    ) -> Result<AuthResponse, AuthError> {
        let session = Self::demo_session();
        Ok(AuthResponse {
            user: session.user.clone(),
            session: Some(session),
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *self.current.lock() = None;
        self.emit(IdentityEvent::SignedOut);
        Ok(())
    }

    fn on_identity_change(&self, callback: IdentityChangeCallback) {
        self.callbacks.lock().push(callback.clone());

        // Report the provider's view once, shortly after registration.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let current = self.current.clone();
            handle.spawn(async move {
                tokio::time::sleep(INITIAL_EVENT_DELAY).await;
                let session = current.lock().clone();
                let event = if session.is_some() {
                    IdentityEvent::InitialSession
                } else {
                    IdentityEvent::SignedOut
                };
                callback(event, session);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_accepts_any_credentials() {
        let identity = DemoIdentity::new();
        assert!(identity.get_current_session().await.unwrap().is_none());

        let response = identity.sign_in("anyone@example.com", "x").await.unwrap();
        assert_eq!(response.user.email.as_deref(), Some("demo@gecr.com"));
        assert!(identity.get_current_session().await.unwrap().is_some());

        identity.sign_out().await.unwrap();
        assert!(identity.get_current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_demo_reports_state_after_hook_registration() {
        let identity = DemoIdentity::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        identity.on_identity_change(Arc::new(move |event: IdentityEvent, session: Option<Session>| {
            sink.lock().push((event, session.is_some()));
        }));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(*events.lock(), vec![(IdentityEvent::SignedOut, false)]);
    }
}
