mod common;

use common::{session, Harness, MockIdentity};
use gecr_store::auth::IdentityEvent;
use gecr_store::config::AppConfig;
use gecr_store::router::{HistoryAdapter, Resolution, AUDIT_PATH, DEPARTMENTS_PATH, HOME_PATH};

#[tokio::test]
async fn test_signed_out_home_redirects_to_login_in_place() {
    let h = Harness::new(MockIdentity::new(), "/");

    assert_eq!(h.app.start().await, Resolution::Redirected);

    assert_eq!(h.app.address(), "/login");
    assert_eq!(h.app.history.entries(), vec!["/login"]);
    assert_eq!(h.seen(), vec!["login"]);
}

#[tokio::test]
async fn test_sign_in_on_login_moves_to_dashboard() {
    let h = Harness::new(MockIdentity::new(), "/login");
    assert_eq!(h.app.start().await, Resolution::Public);

    h.app.gateway.sign_in("asha@gecr.com", "pw").await.unwrap();

    assert_eq!(h.app.router.current_path(), "/");
    assert_eq!(h.seen(), vec!["login", "dashboard"]);

    // The provider's own event arrives late and changes nothing
    h.identity
        .fire(IdentityEvent::SignedIn, Some(session("asha", "token-1")));
    assert_eq!(h.seen(), vec!["login", "dashboard"]);
}

#[tokio::test]
async fn test_persisted_session_skips_login() {
    let h = Harness::new(MockIdentity::with_session(session("asha", "t0")), "/login");

    assert_eq!(h.app.start().await, Resolution::Authorized);

    assert_eq!(h.app.address(), "/");
    assert_eq!(h.seen(), vec!["dashboard"]);
}

#[tokio::test]
async fn test_persisted_session_opens_protected_page_directly() {
    let h = Harness::new(
        MockIdentity::with_session(session("asha", "t0")),
        "/departments",
    );
    assert_eq!(h.app.start().await, Resolution::Authorized);
    assert_eq!(h.seen(), vec!["departments"]);
}

#[tokio::test]
async fn test_sign_out_evicts_from_protected_page() {
    let h = Harness::new(
        MockIdentity::with_session(session("asha", "t0")),
        "/audit",
    );
    h.app.start().await;

    h.app.logout().await;

    assert_eq!(h.app.router.current_path(), "/login");
    assert_eq!(h.seen(), vec!["audit", "login"]);
    assert_eq!(
        h.app.toaster.take().unwrap().message,
        "Logged out successfully"
    );
}

#[tokio::test]
async fn test_expired_session_from_provider_evicts() {
    let h = Harness::new(
        MockIdentity::with_session(session("asha", "t0")),
        "/departments",
    );
    h.app.start().await;

    h.identity.fire(IdentityEvent::SignedOut, None);

    assert_eq!(h.app.router.current_path(), "/login");
    assert!(!h.app.store.is_authenticated());
}

#[tokio::test]
async fn test_unknown_path_is_not_found_regardless_of_session() {
    let h = Harness::new(MockIdentity::new(), "/reports");
    assert_eq!(h.app.start().await, Resolution::NotFound);
    assert_eq!(h.seen(), vec!["not-found"]);

    let h = Harness::new(
        MockIdentity::with_session(session("asha", "t0")),
        "/reports",
    );
    assert_eq!(h.app.start().await, Resolution::NotFound);
}

#[tokio::test]
async fn test_back_after_logout_is_guarded() {
    let h = Harness::new(MockIdentity::new(), "/login");
    h.app.start().await;
    h.app.gateway.sign_in("asha@gecr.com", "pw").await.unwrap();
    h.app.router.navigate("/audit");
    h.app.logout().await;
    assert_eq!(h.app.router.current_path(), "/login");

    // History still holds /audit behind the login entry
    assert!(h.app.history.back());
    assert_eq!(h.app.router.current_path(), "/login");
    assert_eq!(h.seen().last().map(String::as_str), Some("login"));
}

#[tokio::test]
async fn test_base_path_is_kept_in_the_address_bar() {
    let config = AppConfig {
        base_path: "/store".to_string(),
        ..AppConfig::default()
    };
    let h = Harness::with_config(MockIdentity::new(), "/", config);

    assert_eq!(h.app.start().await, Resolution::Redirected);
    assert_eq!(h.app.address(), "/store/login");

    h.app.gateway.sign_in("asha@gecr.com", "pw").await.unwrap();
    assert_eq!(h.app.address(), "/store/");
    assert_eq!(h.app.router.current_path(), "/");
    assert_eq!(h.app.history.current_path(), "/store/");
}

#[tokio::test]
async fn test_every_navbar_path_is_a_registered_page() {
    let h = Harness::new(MockIdentity::with_session(session("asha", "t0")), "/");
    h.app.start().await;

    for path in [DEPARTMENTS_PATH, AUDIT_PATH, HOME_PATH] {
        assert_eq!(h.app.router.navigate(path), Resolution::Authorized);
    }
    assert_eq!(
        h.seen(),
        vec!["dashboard", "departments", "audit", "dashboard"]
    );
}
