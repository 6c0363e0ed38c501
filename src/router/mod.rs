//! Router
//! Mission: Map paths to pages and keep protected pages behind the session guard
//!
//! Every resolution ends in exactly one of four outcomes and fires the
//! route listeners exactly once with exactly one page factory, except when a
//! protected route redirects and no `/login` route exists (nothing to show).

pub mod history;

pub use history::{HistoryAdapter, MemoryHistory};

use crate::auth::AuthGuard;
use crate::observer::{ListenerRegistry, Subscription};
use crate::pages::{NotFoundPage, PageFactory};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

pub const HOME_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const DEPARTMENTS_PATH: &str = "/departments";
pub const AUDIT_PATH: &str = "/audit";
pub const NOT_FOUND_PATH: &str = "/404";

/// Outcome of resolving the current path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Route does not require a session
    Public,
    /// Protected route, session present
    Authorized,
    /// Protected route without a session; address rewritten to login
    Redirected,
    /// No route registered for the path
    NotFound,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Authorized => write!(f, "authorized"),
            Self::Redirected => write!(f, "redirected"),
            Self::NotFound => write!(f, "not_found"),
        }
    }
}

#[derive(Clone)]
struct RouteEntry {
    factory: PageFactory,
    requires_auth: bool,
}

pub struct Router {
    history: Arc<dyn HistoryAdapter>,
    guard: Arc<dyn AuthGuard>,
    /// "" when mounted at the root, otherwise e.g. "/store"
    prefix: String,
    routes: RwLock<HashMap<String, RouteEntry>>,
    listeners: ListenerRegistry<PageFactory>,
    fallback: PageFactory,
    history_subscription: Mutex<Option<Subscription>>,
}

impl Router {
    pub fn new(history: Arc<dyn HistoryAdapter>, guard: Arc<dyn AuthGuard>) -> Arc<Self> {
        Self::with_base_path(history, guard, "/")
    }

    /// Build a router mounted under `base_path` and wire it to history moves.
    pub fn with_base_path(
        history: Arc<dyn HistoryAdapter>,
        guard: Arc<dyn AuthGuard>,
        base_path: &str,
    ) -> Arc<Self> {
        let router = Arc::new(Self {
            history,
            guard,
            prefix: base_path.trim_end_matches('/').to_string(),
            routes: RwLock::new(HashMap::new()),
            listeners: ListenerRegistry::new(),
            fallback: PageFactory::new("not-found", || Box::new(NotFoundPage)),
            history_subscription: Mutex::new(None),
        });

        let weak: Weak<Router> = Arc::downgrade(&router);
        let subscription = router.history.on_path_change(Box::new(move |path: &String| {
            if let Some(router) = weak.upgrade() {
                debug!(path = %path, "History moved");
                router.route();
            }
        }));
        *router.history_subscription.lock() = Some(subscription);

        router
    }

    /// Bind `path` to a page factory. Registering a path again replaces it.
    pub fn register(&self, path: &str, factory: PageFactory, requires_auth: bool) {
        let previous = self.routes.write().insert(
            path.to_string(),
            RouteEntry {
                factory,
                requires_auth,
            },
        );
        if previous.is_some() {
            debug!(path, "Route re-registered");
        }
    }

    /// Push a history entry for `path` and resolve it.
    pub fn navigate(&self, path: &str) -> Resolution {
        self.history.push(&self.full_path(path));
        self.route()
    }

    /// Resolve the current address and fire the route listeners.
    pub fn route(&self) -> Resolution {
        let path = self.current_path();

        let (matched, not_found, login) = {
            let routes = self.routes.read();
            (
                routes.get(&path).cloned(),
                routes.get(NOT_FOUND_PATH).map(|e| e.factory.clone()),
                routes.get(LOGIN_PATH).map(|e| e.factory.clone()),
            )
        };

        let Some(entry) = matched else {
            debug!(path = %path, "No route matched");
            let factory = not_found.unwrap_or_else(|| self.fallback.clone());
            self.listeners.notify(&factory);
            return Resolution::NotFound;
        };

        if !entry.requires_auth {
            self.listeners.notify(&entry.factory);
            return Resolution::Public;
        }

        if self.guard.is_authenticated() {
            self.listeners.notify(&entry.factory);
            return Resolution::Authorized;
        }

        info!("🔒 {} requires a session, redirecting to login", path);
        self.history.replace(&self.full_path(LOGIN_PATH));
        match login {
            Some(factory) => self.listeners.notify(&factory),
            None => warn!("⚠️ Protected route {} has no {} route to redirect to", path, LOGIN_PATH),
        }
        Resolution::Redirected
    }

    /// Listen for resolved pages. Listeners fire in registration order.
    pub fn on_route<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&PageFactory) + Send + Sync + 'static,
    {
        self.listeners.add(callback)
    }

    /// Visible path with the base path stripped
    pub fn current_path(&self) -> String {
        let raw = self.history.current_path();
        if self.prefix.is_empty() {
            return raw;
        }
        match raw.strip_prefix(&self.prefix) {
            Some("") => HOME_PATH.to_string(),
            Some(rest) if rest.starts_with('/') => rest.to_string(),
            _ => raw,
        }
    }

    pub fn is_registered(&self, path: &str) -> bool {
        self.routes.read().contains_key(path)
    }

    fn full_path(&self, path: &str) -> String {
        format!("{}{}", self.prefix, path)
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        if let Some(subscription) = self.history_subscription.lock().take() {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::{Page, PageFactory};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Blank(&'static str);

    #[async_trait]
    impl Page for Blank {
        fn title(&self) -> &str {
            self.0
        }
        async fn load(&mut self) {}
        fn render(&self) -> String {
            self.0.to_string()
        }
        async fn handle(&mut self, _command: &str, _args: &[String]) -> bool {
            false
        }
    }

    fn factory(name: &'static str) -> PageFactory {
        PageFactory::new(name, move || Box::new(Blank(name)))
    }

    #[derive(Default)]
    struct CountingGuard {
        authenticated: AtomicBool,
        checks: AtomicUsize,
    }

    impl AuthGuard for CountingGuard {
        fn is_authenticated(&self) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst);
            self.authenticated.load(Ordering::SeqCst)
        }
    }

    fn setup(initial: &str, base: &str) -> (Arc<Router>, Arc<MemoryHistory>, Arc<CountingGuard>, Arc<Mutex<Vec<String>>>) {
        let history = Arc::new(MemoryHistory::new(initial));
        let guard = Arc::new(CountingGuard::default());
        let router = Router::with_base_path(history.clone(), guard.clone(), base);
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        let _ = router.on_route(move |f: &PageFactory| sink.lock().push(f.name().to_string()));
        (router, history, guard, fired)
    }

    #[test]
    fn test_protected_route_redirects_with_replace() {
        let (router, history, _guard, fired) = setup("/", "/");
        router.register("/", factory("dashboard"), true);
        router.register(LOGIN_PATH, factory("login"), false);

        assert_eq!(router.route(), Resolution::Redirected);
        assert_eq!(history.current_path(), "/login");
        assert_eq!(history.len(), 1);
        assert_eq!(*fired.lock(), vec!["login"]);
    }

    #[test]
    fn test_public_route_never_consults_guard() {
        let (router, _history, guard, fired) = setup("/login", "/");
        router.register(LOGIN_PATH, factory("login"), false);

        assert_eq!(router.route(), Resolution::Public);
        assert_eq!(router.navigate(LOGIN_PATH), Resolution::Public);
        assert_eq!(guard.checks.load(Ordering::SeqCst), 0);
        assert_eq!(fired.lock().len(), 2);
    }

    #[test]
    fn test_unmatched_path_uses_404_route_or_fallback() {
        let (router, _history, guard, fired) = setup("/nowhere", "/");
        assert_eq!(router.route(), Resolution::NotFound);
        assert_eq!(fired.lock().last().map(String::as_str), Some("not-found"));

        router.register(NOT_FOUND_PATH, factory("custom-404"), true);
        assert_eq!(router.route(), Resolution::NotFound);
        assert_eq!(fired.lock().last().map(String::as_str), Some("custom-404"));
        assert_eq!(guard.checks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_authorized_route_and_reregistration() {
        let (router, _history, guard, fired) = setup("/", "/");
        guard.authenticated.store(true, Ordering::SeqCst);
        router.register("/audit", factory("audit-v1"), true);
        router.register("/audit", factory("audit-v2"), true);

        assert_eq!(router.navigate("/audit"), Resolution::Authorized);
        assert_eq!(*fired.lock(), vec!["audit-v2"]);
    }

    #[test]
    fn test_back_navigation_resolves_without_pushing() {
        let (router, history, guard, fired) = setup("/", "/");
        guard.authenticated.store(true, Ordering::SeqCst);
        router.register("/", factory("dashboard"), true);
        router.register("/departments", factory("departments"), true);

        router.navigate("/departments");
        assert!(history.back());
        assert_eq!(history.len(), 2);
        assert_eq!(*fired.lock(), vec!["departments", "dashboard"]);
    }

    #[test]
    fn test_base_path_prefixing() {
        let (router, history, _guard, fired) = setup("/store/", "/store/");
        router.register("/", factory("dashboard"), true);
        router.register(LOGIN_PATH, factory("login"), false);

        assert_eq!(router.current_path(), "/");
        assert_eq!(router.route(), Resolution::Redirected);
        assert_eq!(history.current_path(), "/store/login");
        assert_eq!(router.current_path(), "/login");

        router.navigate("/audit");
        assert_eq!(history.current_path(), "/store/audit");
        assert_eq!(*fired.lock(), vec!["login", "not-found"]);
    }

    #[test]
    fn test_redirect_without_login_route_fires_nothing() {
        let (router, history, _guard, fired) = setup("/", "/");
        router.register("/", factory("dashboard"), true);

        assert_eq!(router.route(), Resolution::Redirected);
        assert_eq!(history.current_path(), "/login");
        assert!(fired.lock().is_empty());
    }
}
