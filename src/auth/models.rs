//! Authentication Models
//! Mission: Define the identity and session shapes shared with the identity service

use serde::{Deserialize, Serialize};

/// Authenticated identity as returned by the identity service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Free-form metadata attached at sign-up
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl User {
    /// Name shown in the navbar: username, else the email local part, else "User".
    pub fn display_name(&self) -> String {
        if let Some(name) = self
            .user_metadata
            .username
            .as_deref()
            .filter(|n| !n.is_empty())
        {
            return name.to_string();
        }
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or("User")
            .to_string()
    }
}

/// Session issued by the identity service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

/// Process-wide authentication state. User and session are always replaced together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<User>,
    pub session: Option<Session>,
}

impl SessionState {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn from_session(session: Option<Session>) -> Self {
        Self {
            user: session.as_ref().map(|s| s.user.clone()),
            session,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Identity key used to decide whether an update is an actual change.
    pub(crate) fn fingerprint(&self) -> (Option<&str>, Option<&str>) {
        (
            self.user.as_ref().map(|u| u.id.as_str()),
            self.session.as_ref().map(|s| s.access_token.as_str()),
        )
    }
}

/// Out-of-band identity events delivered by the change hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

impl std::fmt::Display for IdentityEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InitialSession => write!(f, "INITIAL_SESSION"),
            Self::SignedIn => write!(f, "SIGNED_IN"),
            Self::SignedOut => write!(f, "SIGNED_OUT"),
            Self::TokenRefreshed => write!(f, "TOKEN_REFRESHED"),
            Self::UserUpdated => write!(f, "USER_UPDATED"),
        }
    }
}
