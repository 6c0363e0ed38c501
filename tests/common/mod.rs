#![allow(dead_code)]

use async_trait::async_trait;
use gecr_store::app::App;
use gecr_store::auth::{
    AuthResponse, IdentityChangeCallback, IdentityEvent, IdentityService, Session, SessionStore,
    User, UserMetadata,
};
use gecr_store::config::AppConfig;
use gecr_store::data::DemoDataService;
use gecr_store::error::AuthError;
use gecr_store::pages::PageFactory;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn user(id: &str) -> User {
    User {
        id: id.to_string(),
        email: Some(format!("{}@gecr.com", id)),
        user_metadata: UserMetadata {
            username: Some(id.to_string()),
        },
    }
}

pub fn session(id: &str, token: &str) -> Session {
    Session {
        access_token: token.to_string(),
        refresh_token: Some(format!("{}-refresh", token)),
        expires_at: None,
        user: user(id),
    }
}

/// Identity provider double. Events only fire when a test calls [`MockIdentity::fire`].
pub struct MockIdentity {
    current: Mutex<Result<Option<Session>, AuthError>>,
    reject_sign_in: Mutex<Option<AuthError>>,
    callbacks: Mutex<Vec<IdentityChangeCallback>>,
    pub sign_in_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
}

impl MockIdentity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(Ok(None)),
            reject_sign_in: Mutex::new(None),
            callbacks: Mutex::new(Vec::new()),
            sign_in_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        })
    }

    /// Provider that already holds a persisted session
    pub fn with_session(session: Session) -> Arc<Self> {
        let mock = Self::new();
        *mock.current.lock() = Ok(Some(session));
        mock
    }

    /// Provider whose session lookup fails
    pub fn unreachable() -> Arc<Self> {
        let mock = Self::new();
        *mock.current.lock() = Err(AuthError::new("Failed to fetch"));
        mock
    }

    pub fn reject_sign_in(&self, message: &str) {
        *self.reject_sign_in.lock() = Some(AuthError::with_status(message, 400));
    }

    /// Deliver an identity change to every registered hook.
    pub fn fire(&self, event: IdentityEvent, session: Option<Session>) {
        let callbacks: Vec<_> = self.callbacks.lock().clone();
        for callback in callbacks {
            callback(event, session.clone());
        }
    }

    pub fn hook_count(&self) -> usize {
        self.callbacks.lock().len()
    }
}

#[async_trait]
impl IdentityService for MockIdentity {
    async fn get_current_session(&self) -> Result<Option<Session>, AuthError> {
        self.current.lock().clone()
    }

    async fn sign_in(&self, email: &str, _password: &str) -> Result<AuthResponse, AuthError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.reject_sign_in.lock().clone() {
            return Err(err);
        }
        let id = email.split('@').next().unwrap_or(email);
        let session = session(id, "token-1");
        *self.current.lock() = Ok(Some(session.clone()));
        Ok(AuthResponse {
            user: session.user.clone(),
            session: Some(session),
        })
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        username: &str,
    ) -> Result<AuthResponse, AuthError> {
        let mut user = user(username);
        user.email = Some(email.to_string());
        Ok(AuthResponse {
            user,
            session: None,
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        *self.current.lock() = Ok(None);
        Ok(())
    }

    fn on_identity_change(&self, callback: IdentityChangeCallback) {
        self.callbacks.lock().push(callback);
    }
}

/// App wired to the mock provider and an empty demo store, with every
/// resolved page name recorded in order.
pub struct Harness {
    pub app: App,
    pub identity: Arc<MockIdentity>,
    pub seen: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    pub fn new(identity: Arc<MockIdentity>, start_path: &str) -> Self {
        Self::with_config(identity, start_path, AppConfig::default())
    }

    pub fn with_config(identity: Arc<MockIdentity>, start_path: &str, config: AppConfig) -> Self {
        let store = SessionStore::new(identity.clone());
        let app = App::assemble(
            config,
            identity.clone(),
            store,
            Arc::new(DemoDataService::empty()),
            start_path,
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _ = app
            .router
            .on_route(move |factory: &PageFactory| sink.lock().push(factory.name().to_string()));

        Self {
            app,
            identity,
            seen,
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}
