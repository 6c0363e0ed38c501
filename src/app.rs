//! Application Wiring
//! Mission: Assemble services, session, router and pages into one running app
//!
//! Startup order matters: the session is initialized first, then the session
//! guard is installed, then the current path is resolved once. That way the
//! first screen is decided by exactly one resolution.

use crate::auth::{
    AuthGateway, DemoIdentity, IdentityService, RestIdentityClient, SessionState, SessionStore,
};
use crate::config::AppConfig;
use crate::data::{DataService, DemoDataService, RestDataClient};
use crate::observer::Subscription;
use crate::pages::{
    AuditPage, DashboardPage, DepartmentsPage, LoginPage, PageContext, PageFactory,
};
use crate::router::{
    HistoryAdapter, MemoryHistory, Resolution, Router, AUDIT_PATH, DEPARTMENTS_PATH, HOME_PATH,
    LOGIN_PATH,
};
use crate::toast::Toaster;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info};

pub struct App {
    pub config: AppConfig,
    pub history: Arc<MemoryHistory>,
    pub store: Arc<SessionStore>,
    pub gateway: AuthGateway,
    pub router: Arc<Router>,
    pub toaster: Arc<Toaster>,
    session_guard: Mutex<Option<Subscription>>,
}

impl App {
    /// Hosted backend when credentials are configured, demo services otherwise.
    pub fn from_config(config: AppConfig, start_path: &str) -> Result<Self> {
        let backend = config
            .backend()
            .map(|(url, key)| (url.to_string(), key.to_string()));

        let Some((url, key)) = backend else {
            info!("🧪 No backend configured, running with demo data");
            let identity: Arc<dyn IdentityService> = Arc::new(DemoIdentity::new());
            let store = SessionStore::new(identity.clone());
            let data: Arc<dyn DataService> = Arc::new(DemoDataService::seeded());
            return Ok(Self::assemble(config, identity, store, data, start_path));
        };

        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        info!("🌐 Using backend at {}", url);
        let identity: Arc<dyn IdentityService> = Arc::new(RestIdentityClient::new(
            client.clone(),
            &url,
            &key,
            config.session_path.clone(),
        ));
        let store = SessionStore::new(identity.clone());
        let data: Arc<dyn DataService> =
            Arc::new(RestDataClient::new(client, &url, &key, store.clone()));
        Ok(Self::assemble(config, identity, store, data, start_path))
    }

    /// Wire the given services together and register every route.
    pub fn assemble(
        config: AppConfig,
        identity: Arc<dyn IdentityService>,
        store: Arc<SessionStore>,
        data: Arc<dyn DataService>,
        start_path: &str,
    ) -> Self {
        let prefix = config.base_path.trim_end_matches('/');
        let history = Arc::new(MemoryHistory::new(&format!("{}{}", prefix, start_path)));
        let router = Router::with_base_path(history.clone(), store.clone(), &config.base_path);
        let gateway = AuthGateway::new(identity, store.clone());
        let toaster = Arc::new(Toaster::new());

        let ctx = PageContext {
            data,
            gateway: gateway.clone(),
            toaster: toaster.clone(),
            export_dir: config.export_dir.clone(),
        };
        register_routes(&router, &ctx);

        Self {
            config,
            history,
            store,
            gateway,
            router,
            toaster,
            session_guard: Mutex::new(None),
        }
    }

    /// Initialize the session, install the guard, then resolve once.
    pub async fn start(&self) -> Resolution {
        self.store.initialize().await;
        self.install_session_guard();

        if self.store.is_authenticated() && self.router.current_path() == LOGIN_PATH {
            self.router.navigate(HOME_PATH)
        } else {
            self.router.route()
        }
    }

    /// Keep the visible page in line with the session: signed-out users land
    /// on login, signed-in users leave it.
    fn install_session_guard(&self) {
        let mut slot = self.session_guard.lock();
        if slot.is_some() {
            return;
        }

        let router = Arc::downgrade(&self.router);
        *slot = Some(self.store.subscribe(move |state: &SessionState| {
            let Some(router) = router.upgrade() else {
                return;
            };
            let path = router.current_path();
            match (state.user.is_some(), path == LOGIN_PATH) {
                (false, false) => {
                    debug!(path = %path, "Session ended, returning to login");
                    router.navigate(LOGIN_PATH);
                }
                (true, true) => {
                    router.navigate(HOME_PATH);
                }
                _ => {}
            }
        }));
    }

    pub async fn logout(&self) {
        match self.gateway.sign_out().await {
            Ok(()) => self.toaster.success("Logged out successfully"),
            Err(e) => self.toaster.danger(e.message),
        }
    }

    /// Detach the guard and stop listening for identity changes.
    pub fn shutdown(&self) {
        if let Some(guard) = self.session_guard.lock().take() {
            guard.unsubscribe();
        }
        self.store.dispose();
    }

    /// Path shown in the address bar, base path included
    pub fn address(&self) -> String {
        self.history.current_path()
    }
}

fn register_routes(router: &Router, ctx: &PageContext) {
    let c = ctx.clone();
    router.register(
        HOME_PATH,
        PageFactory::new("dashboard", move || Box::new(DashboardPage::new(c.clone()))),
        true,
    );
    let c = ctx.clone();
    router.register(
        LOGIN_PATH,
        PageFactory::new("login", move || Box::new(LoginPage::new(c.clone()))),
        false,
    );
    let c = ctx.clone();
    router.register(
        DEPARTMENTS_PATH,
        PageFactory::new("departments", move || {
            Box::new(DepartmentsPage::new(c.clone()))
        }),
        true,
    );
    let c = ctx.clone();
    router.register(
        AUDIT_PATH,
        PageFactory::new("audit", move || Box::new(AuditPage::new(c.clone()))),
        true,
    );
}
