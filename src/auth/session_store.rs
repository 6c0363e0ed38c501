//! Session Store
//! Mission: Own the process-wide session and fan changes out to subscribers
//!
//! Every write goes through one private writer that a disposed store refuses.
//! Initialization always notifies; [`SessionStore::apply`] is used by the
//! identity-change hook and the gateway, and it only notifies when the identity or
//! token actually changed, so a sign-in pushed by the gateway followed by the
//! provider's own SIGNED_IN event produces a single notification.

use crate::auth::identity::IdentityService;
use crate::auth::models::{IdentityEvent, Session, SessionState, User};
use crate::observer::{ListenerRegistry, Subscription};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Read side of the session used by route guards
pub trait AuthGuard: Send + Sync {
    fn is_authenticated(&self) -> bool;
}

pub struct SessionStore {
    identity: Arc<dyn IdentityService>,
    state: RwLock<SessionState>,
    listeners: ListenerRegistry<SessionState>,
    hook_installed: AtomicBool,
    disposed: AtomicBool,
}

impl SessionStore {
    pub fn new(identity: Arc<dyn IdentityService>) -> Arc<Self> {
        Arc::new(Self {
            identity,
            state: RwLock::new(SessionState::signed_out()),
            listeners: ListenerRegistry::new(),
            hook_installed: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        })
    }

    /// Load the persisted session and install the identity-change hook.
    ///
    /// An unreachable provider degrades to a signed-out state; subscribers
    /// are notified exactly once either way.
    pub async fn initialize(self: &Arc<Self>) {
        let next = match self.identity.get_current_session().await {
            Ok(session) => SessionState::from_session(session),
            Err(e) => {
                warn!("⚠️ Identity service unavailable, continuing signed out: {}", e);
                SessionState::signed_out()
            }
        };

        let authenticated = next.is_authenticated();
        if !self.replace(next, true) {
            return;
        }
        info!(authenticated, "🔐 Session initialized");

        if !self.hook_installed.swap(true, Ordering::SeqCst) {
            let weak: Weak<SessionStore> = Arc::downgrade(self);
            self.identity
                .on_identity_change(Arc::new(move |event: IdentityEvent, session: Option<Session>| {
                    if let Some(store) = weak.upgrade() {
                        debug!(%event, "Identity change received");
                        store.apply(SessionState::from_session(session));
                    }
                }));
        }
    }

    /// Stop reacting to identity changes and drop every subscriber.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.listeners.clear();
    }

    /// Replace the session wholesale. Returns whether anything changed.
    pub fn apply(&self, next: SessionState) -> bool {
        self.replace(next, false)
    }

    /// The only place the state is written. `force` notifies even when the
    /// fingerprint is unchanged. A disposed store is never written.
    fn replace(&self, next: SessionState, force: bool) -> bool {
        if self.disposed.load(Ordering::SeqCst) {
            return false;
        }

        {
            let mut state = self.state.write();
            if !force && state.fingerprint() == next.fingerprint() {
                return false;
            }
            *state = next.clone();
        }

        debug!(
            authenticated = next.is_authenticated(),
            "Session state changed"
        );
        self.listeners.notify(&next);
        true
    }

    /// Register a callback that receives the full state on every change.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        self.listeners.add(callback)
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().is_authenticated()
    }

    pub fn get_user(&self) -> Option<User> {
        self.state.read().user.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state
            .read()
            .session
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

impl AuthGuard for SessionStore {
    fn is_authenticated(&self) -> bool {
        SessionStore::is_authenticated(self)
    }
}
