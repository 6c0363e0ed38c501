//! Identity REST Client
//! Mission: Talk to the hosted identity endpoints (`/auth/v1`) and keep the session alive
//!
//! The session is persisted to a JSON file when a path is configured, and a
//! background task refreshes the access token shortly before it expires.

use crate::auth::identity::{AuthResponse, IdentityChangeCallback, IdentityService};
use crate::auth::models::{IdentityEvent, Session, User, UserMetadata};
use crate::error::AuthError;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Refresh this many seconds before the token expires
const REFRESH_MARGIN_SECS: i64 = 60;

/// Retry interval while the identity service is unreachable
const REFRESH_RETRY_SECS: i64 = REFRESH_MARGIN_SECS / 4;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| Utc::now().timestamp() + secs));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

struct Inner {
    client: Client,
    base_url: String,
    anon_key: String,
    session_path: Option<PathBuf>,
    current: Mutex<Option<Session>>,
    callbacks: Mutex<Vec<IdentityChangeCallback>>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct RestIdentityClient {
    inner: Arc<Inner>,
}

impl RestIdentityClient {
    pub fn new(
        client: Client,
        project_url: &str,
        anon_key: &str,
        session_path: Option<PathBuf>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                base_url: format!("{}/auth/v1", project_url.trim_end_matches('/')),
                anon_key: anon_key.to_string(),
                session_path,
                current: Mutex::new(None),
                callbacks: Mutex::new(Vec::new()),
                refresh_task: Mutex::new(None),
            }),
        }
    }
}

impl Inner {
    #[inline]
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, bearer: Option<&str>, body: &Value) -> Result<Response, AuthError> {
        let token = bearer.unwrap_or(&self.anon_key);
        self.client
            .post(self.url(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::new(format!("Identity service unreachable: {}", e)))
    }

    async fn token_grant(&self, grant_type: &str, body: &Value) -> Result<Session, AuthError> {
        let resp = self
            .post(&format!("/token?grant_type={}", grant_type), None, body)
            .await?;
        let resp = check_status(resp).await?;
        let token = resp
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::new(format!("Malformed token response: {}", e)))?;
        Ok(token.into_session())
    }

    async fn load_persisted(&self) -> Option<Session> {
        let path = self.session_path.as_ref()?;
        let bytes = tokio::fs::read(path).await.ok()?;
        match serde_json::from_slice::<Session>(&bytes) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("⚠️ Ignoring unreadable session file {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn persist(&self, session: Option<&Session>) {
        let Some(path) = self.session_path.as_ref() else {
            return;
        };
        let result = match session {
            Some(s) => match serde_json::to_vec_pretty(s) {
                Ok(bytes) => tokio::fs::write(path, bytes).await,
                Err(e) => {
                    warn!("Failed to encode session: {}", e);
                    return;
                }
            },
            None => match tokio::fs::remove_file(path).await {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(e) = result {
            warn!("⚠️ Failed to persist session to {}: {}", path.display(), e);
        }
    }

    fn emit(&self, event: IdentityEvent) {
        let session = self.current.lock().clone();
        let callbacks: Vec<_> = self.callbacks.lock().clone();
        for callback in callbacks {
            callback(event, session.clone());
        }
    }

    fn cancel_refresh(&self) {
        if let Some(task) = self.refresh_task.lock().take() {
            task.abort();
        }
    }
}

/// Store the session, persist it and (re)arm the refresh timer.
async fn adopt(inner: &Arc<Inner>, session: Option<Session>) {
    *inner.current.lock() = session.clone();
    inner.persist(session.as_ref()).await;
    inner.cancel_refresh();

    if let Some(session) = session {
        if let (Some(expires_at), Some(_)) = (session.expires_at, session.refresh_token.as_ref()) {
            let task = tokio::spawn(refresh_loop(Arc::downgrade(inner), expires_at));
            *inner.refresh_task.lock() = Some(task);
        }
    }
}

/// Refresh shortly before expiry. A rejected refresh ends the session; a
/// transport failure keeps it and retries until the token actually expires.
async fn refresh_loop(weak: std::sync::Weak<Inner>, mut expires_at: i64) {
    let mut next_attempt = expires_at - REFRESH_MARGIN_SECS;
    loop {
        let wait = (next_attempt - Utc::now().timestamp()).max(0) as u64;
        tokio::time::sleep(Duration::from_secs(wait)).await;

        let Some(inner) = weak.upgrade() else {
            return;
        };
        let refresh_token = inner
            .current
            .lock()
            .as_ref()
            .and_then(|s| s.refresh_token.clone());
        let Some(refresh_token) = refresh_token else {
            return;
        };

        match inner
            .token_grant("refresh_token", &json!({ "refresh_token": refresh_token }))
            .await
        {
            Ok(session) => {
                debug!("Access token refreshed for {}", session.user.id);
                expires_at = session.expires_at.unwrap_or(expires_at + 3600);
                next_attempt = expires_at - REFRESH_MARGIN_SECS;
                *inner.current.lock() = Some(session.clone());
                inner.persist(Some(&session)).await;
                inner.emit(IdentityEvent::TokenRefreshed);
            }
            Err(e) if e.status.is_some() => {
                warn!("⚠️ Session refresh rejected, signing out: {}", e);
                *inner.current.lock() = None;
                inner.persist(None).await;
                inner.emit(IdentityEvent::SignedOut);
                return;
            }
            Err(e) => {
                let now = Utc::now().timestamp();
                if now >= expires_at {
                    // Stored refresh token stays on disk for the next start
                    warn!("⚠️ Session expired while identity service unreachable: {}", e);
                    *inner.current.lock() = None;
                    inner.emit(IdentityEvent::SignedOut);
                    return;
                }
                next_attempt = (now + REFRESH_RETRY_SECS).min(expires_at);
                warn!(
                    "⚠️ Session refresh failed, retrying in {}s: {}",
                    next_attempt - now,
                    e
                );
            }
        }
    }
}

/// Turn a non-2xx response into an [`AuthError`] carrying the provider's message.
async fn check_status(resp: Response) -> Result<Response, AuthError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(AuthError::with_status(
        error_message(status, &body),
        status.as_u16(),
    ))
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["error_description", "msg", "message", "error"] {
            if let Some(msg) = value.get(key).and_then(Value::as_str) {
                if !msg.is_empty() {
                    return msg.to_string();
                }
            }
        }
    }
    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Identity service error")
            .to_string()
    } else {
        body.trim().to_string()
    }
}

/// Sign-up returns a full token payload when auto-confirm is on, otherwise just the user.
fn parse_sign_up(value: Value) -> Result<AuthResponse, AuthError> {
    if value.get("access_token").is_some() {
        let token: TokenResponse = serde_json::from_value(value)
            .map_err(|e| AuthError::new(format!("Malformed sign-up response: {}", e)))?;
        let session = token.into_session();
        return Ok(AuthResponse {
            user: session.user.clone(),
            session: Some(session),
        });
    }
    let user_value = value.get("user").cloned().unwrap_or(value);
    let user: User = serde_json::from_value(user_value)
        .map_err(|e| AuthError::new(format!("Malformed sign-up response: {}", e)))?;
    Ok(AuthResponse {
        user,
        session: None,
    })
}

#[async_trait]
impl IdentityService for RestIdentityClient {
    async fn get_current_session(&self) -> Result<Option<Session>, AuthError> {
        let existing = self.inner.current.lock().clone();
        let session = match existing {
            Some(s) => Some(s),
            None => self.inner.load_persisted().await,
        };
        let Some(session) = session else {
            return Ok(None);
        };

        let now = Utc::now().timestamp();
        let expired = session
            .expires_at
            .map(|at| at - REFRESH_MARGIN_SECS <= now)
            .unwrap_or(false);
        if !expired {
            adopt(&self.inner, Some(session.clone())).await;
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.clone() else {
            adopt(&self.inner, None).await;
            return Ok(None);
        };
        match self
            .inner
            .token_grant("refresh_token", &json!({ "refresh_token": refresh_token }))
            .await
        {
            Ok(fresh) => {
                adopt(&self.inner, Some(fresh.clone())).await;
                Ok(Some(fresh))
            }
            // Rejected refresh means the stored session is dead; transport errors propagate.
            Err(e) if e.status.is_some() => {
                info!("Stored session expired: {}", e);
                adopt(&self.inner, None).await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let session = self
            .inner
            .token_grant("password", &json!({ "email": email, "password": password }))
            .await?;
        adopt(&self.inner, Some(session.clone())).await;
        self.inner.emit(IdentityEvent::SignedIn);
        Ok(AuthResponse {
            user: session.user.clone(),
            session: Some(session),
        })
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<AuthResponse, AuthError> {
        let metadata = UserMetadata {
            username: Some(username.to_string()),
        };
        let body = json!({ "email": email, "password": password, "data": metadata });
        let resp = self.inner.post("/signup", None, &body).await?;
        let resp = check_status(resp).await?;
        let value = resp
            .json::<Value>()
            .await
            .map_err(|e| AuthError::new(format!("Malformed sign-up response: {}", e)))?;
        parse_sign_up(value)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let token = self
            .inner
            .current
            .lock()
            .as_ref()
            .map(|s| s.access_token.clone());
        if let Some(token) = token {
            let resp = self.inner.post("/logout", Some(&token), &json!({})).await?;
            match check_status(resp).await {
                Ok(_) => {}
                // Token already invalid server-side; the local session is gone either way.
                Err(e) if e.status == Some(401) || e.status == Some(404) => {
                    debug!("Logout with stale token: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        adopt(&self.inner, None).await;
        self.inner.emit(IdentityEvent::SignedOut);
        Ok(())
    }

    fn on_identity_change(&self, callback: IdentityChangeCallback) {
        self.inner.callbacks.lock().push(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_description() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, body),
            "Invalid login credentials"
        );

        let body = r#"{"code":422,"msg":"User already registered"}"#;
        assert_eq!(
            error_message(StatusCode::UNPROCESSABLE_ENTITY, body),
            "User already registered"
        );

        assert_eq!(
            error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
            "Service Unavailable"
        );
    }

    #[test]
    fn test_parse_sign_up_without_session() {
        let value = json!({
            "id": "new-user",
            "email": "new@gecr.com",
            "user_metadata": {"username": "newbie"}
        });
        let response = parse_sign_up(value).unwrap();
        assert_eq!(response.user.id, "new-user");
        assert_eq!(response.user.display_name(), "newbie");
        assert!(response.session.is_none());
    }

    #[test]
    fn test_parse_sign_up_with_session_computes_expiry() {
        let value = json!({
            "access_token": "tok",
            "refresh_token": "ref",
            "expires_in": 3600,
            "user": {"id": "u2", "email": "u2@gecr.com"}
        });
        let response = parse_sign_up(value).unwrap();
        let session = response.session.unwrap();
        assert!(session.expires_at.unwrap() > Utc::now().timestamp());
    }

    #[tokio::test]
    async fn test_persisted_session_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let client = RestIdentityClient::new(
            Client::new(),
            "http://127.0.0.1:9",
            "anon",
            Some(path.clone()),
        );

        let session = Session {
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: None,
            user: User {
                id: "u1".to_string(),
                email: None,
                user_metadata: UserMetadata::default(),
            },
        };
        client.inner.persist(Some(&session)).await;
        assert!(path.exists());

        let restored = client.get_current_session().await.unwrap();
        assert_eq!(restored, Some(session));

        client.inner.persist(None).await;
        assert!(!path.exists());
    }

    type Events = Arc<Mutex<Vec<(IdentityEvent, bool)>>>;

    fn refreshable_session(expires_at: i64) -> Session {
        Session {
            access_token: "old".to_string(),
            refresh_token: Some("ref".to_string()),
            expires_at: Some(expires_at),
            user: User {
                id: "u1".to_string(),
                email: Some("u1@gecr.com".to_string()),
                user_metadata: UserMetadata::default(),
            },
        }
    }

    fn recording_client(url: &str, path: PathBuf) -> (RestIdentityClient, Events) {
        let client = RestIdentityClient::new(Client::new(), url, "anon", Some(path));
        let events: Events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        client.on_identity_change(Arc::new(move |event: IdentityEvent, session: Option<Session>| {
            sink.lock().push((event, session.is_some()));
        }));
        (client, events)
    }

    /// Answer a single request with a canned status and JSON body.
    async fn serve_once(status: &'static str, body: Value) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                    let len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + len {
                        break;
                    }
                }
            }

            let body = body.to_string();
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{}", addr)
    }

    async fn wait_for(events: &Events) {
        for _ in 0..50 {
            if !events.lock().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    #[tokio::test]
    async fn test_refresh_before_expiry_emits_token_refreshed() {
        let url = serve_once(
            "200 OK",
            json!({
                "access_token": "fresh",
                "refresh_token": "ref-2",
                "expires_in": 3600,
                "user": {"id": "u1", "email": "u1@gecr.com"}
            }),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let (client, events) = recording_client(&url, path.clone());

        adopt(
            &client.inner,
            Some(refreshable_session(Utc::now().timestamp() + REFRESH_MARGIN_SECS)),
        )
        .await;
        wait_for(&events).await;

        assert_eq!(*events.lock(), vec![(IdentityEvent::TokenRefreshed, true)]);
        let current = client.inner.current.lock().clone().unwrap();
        assert_eq!(current.access_token, "fresh");
        assert_eq!(current.refresh_token.as_deref(), Some("ref-2"));

        let stored: Session = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(stored.access_token, "fresh");
    }

    #[tokio::test]
    async fn test_rejected_refresh_signs_out_and_forgets_session() {
        let url = serve_once(
            "400 Bad Request",
            json!({"error": "invalid_grant", "error_description": "Invalid Refresh Token"}),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let (client, events) = recording_client(&url, path.clone());

        adopt(
            &client.inner,
            Some(refreshable_session(Utc::now().timestamp() + REFRESH_MARGIN_SECS)),
        )
        .await;
        assert!(path.exists());
        wait_for(&events).await;

        assert_eq!(*events.lock(), vec![(IdentityEvent::SignedOut, false)]);
        assert!(client.inner.current.lock().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_unreachable_service_keeps_session_until_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let (client, events) = recording_client("http://127.0.0.1:9", path.clone());

        adopt(
            &client.inner,
            Some(refreshable_session(Utc::now().timestamp() + REFRESH_MARGIN_SECS)),
        )
        .await;
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(events.lock().is_empty());
        assert_eq!(
            client.inner.current.lock().as_ref().map(|s| s.access_token.clone()),
            Some("old".to_string())
        );
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_unreachable_service_after_expiry_signs_out_but_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let (client, events) = recording_client("http://127.0.0.1:9", path.clone());

        adopt(
            &client.inner,
            Some(refreshable_session(Utc::now().timestamp() - 1)),
        )
        .await;
        wait_for(&events).await;

        assert_eq!(*events.lock(), vec![(IdentityEvent::SignedOut, false)]);
        assert!(client.inner.current.lock().is_none());
        assert!(path.exists());
    }
}
