//! Configuration
//! Mission: Resolve backend credentials and local paths from the environment
//!
//! Missing credentials (or the `demo_mode` placeholder) select the in-memory
//! demo services instead of the hosted backend.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEMO_PLACEHOLDER: &str = "demo_mode";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    /// Prefix the app is mounted under, "/" at the root
    pub base_path: String,
    pub export_dir: PathBuf,
    /// Where the identity client keeps the session between runs
    pub session_path: Option<PathBuf>,
    pub http_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_anon_key: None,
            base_path: "/".to_string(),
            export_dir: PathBuf::from("."),
            session_path: None,
            http_timeout: Duration::from_secs(15),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        cfg.supabase_url = non_empty(env::var("SUPABASE_URL").ok())
            .map(|v| v.trim_end_matches('/').to_string());
        cfg.supabase_anon_key = non_empty(env::var("SUPABASE_ANON_KEY").ok());

        if let Some(base) = non_empty(env::var("GECR_BASE_PATH").ok()) {
            cfg.base_path = normalize_base_path(&base);
        }
        if let Some(dir) = non_empty(env::var("GECR_EXPORT_DIR").ok()) {
            cfg.export_dir = PathBuf::from(dir);
        }
        cfg.session_path = non_empty(env::var("GECR_SESSION_PATH").ok()).map(PathBuf::from);

        cfg.http_timeout = env::var("GECR_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .map(Duration::from_secs)
            .unwrap_or(cfg.http_timeout);

        cfg
    }

    /// Whether the hosted backend is unconfigured
    pub fn is_demo(&self) -> bool {
        let unset = |v: &Option<String>| match v.as_deref() {
            None => true,
            Some(v) => v == DEMO_PLACEHOLDER,
        };
        unset(&self.supabase_url) || unset(&self.supabase_anon_key)
    }

    /// `(url, key)` when the hosted backend is configured
    pub fn backend(&self) -> Option<(&str, &str)> {
        if self.is_demo() {
            return None;
        }
        Some((
            self.supabase_url.as_deref()?,
            self.supabase_anon_key.as_deref()?,
        ))
    }
}

/// "/store/" -> "/store", "store" -> "/store", "" -> "/"
pub fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Load `.env` from the working directory, then from the crate root.
pub fn load_env() {
    let _ = dotenv::dotenv();

    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let candidates = [manifest_dir.join(".env"), manifest_dir.join("../.env")];

    for p in candidates {
        if p.exists() {
            let _ = dotenv::from_path(&p);
        }
    }
}
