//! Session container and navigation tests against a mock billing API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use billdesk_core::error::Error;
use billdesk_core::{AccessToken, ApiUrl, Credentials, MemoryBackend, RefreshToken, SessionStore, User};
use billdesk_http::{ClientConfig, Method, RequestOptions, ResilientClient};
use billdesk_session::{
    NavigationState, Navigator, PrivateGuard, RouteTable, SessionConfig, SessionContainer,
    SessionStatus,
};
use billdesk_session::{GuardOutcome, Location};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    session: SessionContainer,
    backend: Arc<MemoryBackend>,
}

impl Harness {
    fn new(server: &MockServer) -> Self {
        let backend = Arc::new(MemoryBackend::default());
        let store = SessionStore::new(backend.clone());
        let api = ApiUrl::new(format!("http://127.0.0.1:{}", server.address().port())).unwrap();
        let config = ClientConfig::new(api)
            .with_timeout(Duration::from_millis(300))
            .with_retry_delay(Duration::from_millis(10));
        let client = ResilientClient::new(config, store.clone()).unwrap();
        let session = SessionContainer::new(client, store, SessionConfig::default());
        Self { session, backend }
    }

    /// Seed the store as if a previous run had logged in.
    fn with_stored_session(self) -> Self {
        let store = self.session.store();
        store.set_user(&User::new("7", "ada@example.com", "Ada Lovelace"));
        store.set_tokens(
            &AccessToken::new("old-access"),
            Some(&RefreshToken::new("refresh-1")),
        );
        self
    }

    fn navigator(&self) -> Navigator {
        Navigator::new(self.session.clone(), RouteTable::billing_default())
    }
}

async fn mount_login_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "ada@example.com", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"id": 7, "email": "ada@example.com", "name": "Ada Lovelace"},
            "accessToken": "access-1",
            "refreshToken": "refresh-1"
        })))
        .mount(server)
        .await;
}

fn ada() -> Credentials {
    Credentials::new("ada@example.com", "hunter2")
}

// ============================================================================
// Login / logout
// ============================================================================

#[tokio::test]
async fn test_login_persists_session() {
    let server = MockServer::start().await;
    mount_login_ok(&server).await;
    let h = Harness::new(&server);

    h.session.login(ada()).await.unwrap();

    let state = h.session.state();
    assert_eq!(state.status(), SessionStatus::Authenticated);
    assert_eq!(state.user().unwrap().id, "7");
    assert_eq!(state.error(), None);

    let tokens = h.session.store().get_tokens().unwrap();
    assert_eq!(tokens.access.as_str(), "access-1");
    assert_eq!(tokens.refresh.unwrap().as_str(), "refresh-1");
    assert_eq!(h.session.store().get_user().unwrap().name, "Ada Lovelace");
}

#[tokio::test]
async fn test_login_rejected_is_validation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid email or password"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let h = Harness::new(&server);

    let err = h.session.login(ada()).await.unwrap_err();
    assert!(matches!(err, Error::Validation { status: Some(401), .. }));

    let state = h.session.state();
    assert_eq!(state.status(), SessionStatus::Error);
    assert_eq!(state.error(), Some("Invalid email or password"));
    assert!(state.user().is_none());
}

#[tokio::test]
async fn test_login_success_without_user_is_validation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "a"})))
        .mount(&server)
        .await;
    let h = Harness::new(&server);

    let err = h.session.login(ada()).await.unwrap_err();
    assert!(matches!(err, Error::Validation { status: None, .. }));
    assert!(h.session.store().get_tokens().is_none());
    assert_eq!(h.session.state().status(), SessionStatus::Error);
}

#[tokio::test]
async fn test_failed_relogin_keeps_active_session() {
    let server = MockServer::start().await;
    mount_login_ok(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "ada@example.com", "password": "wrong"})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Bad credentials"})))
        .mount(&server)
        .await;
    let h = Harness::new(&server);

    h.session.login(ada()).await.unwrap();
    let err = h
        .session
        .login(Credentials::new("ada@example.com", "wrong"))
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Bad credentials");

    let state = h.session.state();
    assert_eq!(state.status(), SessionStatus::Authenticated);
    assert_eq!(
        h.session.store().get_tokens().unwrap().access.as_str(),
        "access-1"
    );
}

#[tokio::test]
async fn test_failed_relogin_keeps_destination_set_meanwhile() {
    let server = MockServer::start().await;
    mount_login_ok(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "ada@example.com", "password": "wrong"})))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"message": "Invalid email or password"}))
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&server)
        .await;
    let h = Harness::new(&server);
    h.session.login(ada()).await.unwrap();

    let relogin = {
        let session = h.session.clone();
        tokio::spawn(async move {
            session
                .login(Credentials::new("ada@example.com", "wrong"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.session.set_intended_destination("/invoices");

    let err = relogin.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Validation { status: Some(401), .. }));

    let state = h.session.state();
    assert_eq!(state.status(), SessionStatus::Authenticated);
    assert_eq!(state.user().unwrap().email, "ada@example.com");
    assert_eq!(state.intended_destination(), Some("/invoices"));
    assert_eq!(
        h.session.store().get_intended_destination().as_deref(),
        Some("/invoices")
    );
}

#[tokio::test]
async fn test_login_server_failure_is_not_validation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .expect(2)
        .mount(&server)
        .await;
    let h = Harness::new(&server);

    let err = h.session.login(ada()).await.unwrap_err();
    assert!(matches!(err, Error::Server(_)));
    assert_eq!(h.session.state().error(), Some("database unavailable"));
}

#[tokio::test]
async fn test_logout_clears_and_notifies_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let h = Harness::new(&server).with_stored_session();
    h.session.set_intended_destination("/clients");

    let task = h.session.logout().expect("logout call should be spawned");

    // Local state is cleared before the server hears about it.
    let state = h.session.state();
    assert_eq!(state.status(), SessionStatus::Unauthenticated);
    assert_eq!(state.intended_destination(), None);
    assert!(h.session.store().get_user().is_none());
    assert!(h.session.store().get_tokens().is_none());

    task.await.unwrap();
}

#[tokio::test]
async fn test_logout_server_failure_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    let h = Harness::new(&server).with_stored_session();

    h.session.logout().unwrap().await.unwrap();
    assert_eq!(h.session.state().status(), SessionStatus::Unauthenticated);
}

// ============================================================================
// Session restore
// ============================================================================

#[tokio::test]
async fn test_restore_without_user_is_unauthenticated() {
    let server = MockServer::start().await;
    Mock::given(path("/dashboard/summary"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let h = Harness::new(&server);

    assert!(!h.session.check_session_validity().await);
    assert_eq!(h.session.state().status(), SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn test_restore_valid_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dashboard/summary"))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"revenue": 0})))
        .expect(1)
        .mount(&server)
        .await;
    let h = Harness::new(&server).with_stored_session();

    assert!(h.session.check_session_validity().await);
    let state = h.session.state();
    assert_eq!(state.status(), SessionStatus::Authenticated);
    assert_eq!(state.user().unwrap().email, "ada@example.com");
}

#[tokio::test]
async fn test_restore_fails_open_without_response() {
    let server = MockServer::start().await;
    Mock::given(path("/dashboard/summary"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;
    let h = Harness::new(&server).with_stored_session();

    assert!(h.session.check_session_validity().await);
    assert_eq!(h.session.state().status(), SessionStatus::Authenticated);
    assert!(h.session.store().get_tokens().is_some());
}

#[tokio::test]
async fn test_restore_fails_open_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(path("/dashboard/summary"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let h = Harness::new(&server).with_stored_session();

    assert!(h.session.check_session_validity().await);
    assert_eq!(h.session.state().status(), SessionStatus::Authenticated);
}

#[tokio::test]
async fn test_restore_fails_closed_when_refresh_rejected() {
    let server = MockServer::start().await;
    Mock::given(path("/dashboard/summary"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Refresh token expired"})))
        .expect(1)
        .mount(&server)
        .await;
    let h = Harness::new(&server).with_stored_session();
    h.session.store().set_intended_destination("/invoices");

    let mut updates = h.session.subscribe();
    assert!(!h.session.check_session_validity().await);

    let state = h.session.state();
    assert_eq!(state.status(), SessionStatus::Unauthenticated);
    assert_eq!(state.error(), Some("session expired"));
    assert!(state.user().is_none());
    assert!(h.session.store().get_user().is_none());
    assert!(h.session.store().get_tokens().is_none());
    assert!(h.session.store().get_intended_destination().is_none());
    assert!(updates.has_changed().unwrap());
}

#[tokio::test]
async fn test_restore_fails_closed_on_forbidden() {
    let server = MockServer::start().await;
    Mock::given(path("/dashboard/summary"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "Account disabled"})))
        .mount(&server)
        .await;
    let h = Harness::new(&server).with_stored_session();

    assert!(!h.session.check_session_validity().await);
    assert_eq!(h.session.state().status(), SessionStatus::Unauthenticated);
    assert!(h.session.store().get_tokens().is_none());
}

#[tokio::test]
async fn test_failed_refresh_signs_out_active_session() {
    let server = MockServer::start().await;
    Mock::given(path("/dashboard/summary"))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(path("/invoices"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let h = Harness::new(&server).with_stored_session();
    assert!(h.session.check_session_validity().await);

    let result = h
        .session
        .client()
        .request(Method::GET, "/invoices", None, RequestOptions::new())
        .await;
    assert!(result.is_err());

    let state = h.session.state();
    assert_eq!(state.status(), SessionStatus::Unauthenticated);
    assert_eq!(state.error(), Some("session expired"));
}

#[tokio::test]
async fn test_late_401_keeps_destination_captured_after_sign_out() {
    let server = MockServer::start().await;
    mount_login_ok(&server).await;
    Mock::given(path("/dashboard/summary"))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(path("/reports"))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(250)))
        .mount(&server)
        .await;
    Mock::given(path("/invoices"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    let h = Harness::new(&server).with_stored_session();
    let navigator = h.navigator();
    assert!(h.session.check_session_validity().await);

    let terminations = Arc::new(AtomicUsize::new(0));
    let counter = terminations.clone();
    h.session.client().on_session_terminated(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let slow = {
        let client = h.session.client().clone();
        tokio::spawn(async move {
            client
                .request(Method::GET, "/reports", None, RequestOptions::new())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let result = h
        .session
        .client()
        .request(Method::GET, "/invoices", None, RequestOptions::new())
        .await;
    assert!(result.is_err());
    assert_eq!(h.session.state().status(), SessionStatus::Unauthenticated);

    let nav = navigator.navigate("/clients").unwrap();
    assert_eq!(nav.location.path, "/login");

    assert!(slow.await.unwrap().is_err());
    assert_eq!(terminations.load(Ordering::SeqCst), 1);
    assert_eq!(h.session.intended_destination().as_deref(), Some("/clients"));
    assert_eq!(
        h.session.store().get_intended_destination().as_deref(),
        Some("/clients")
    );

    h.session.login(ada()).await.unwrap();
    let nav = navigator.navigate("/login").unwrap();
    assert_eq!(nav.location.full_path(), "/clients");
}

// ============================================================================
// Guards
// ============================================================================

#[tokio::test]
async fn test_private_capture_is_idempotent() {
    let server = MockServer::start().await;
    let h = Harness::new(&server);
    assert!(!h.session.check_session_validity().await);

    let guard = PrivateGuard::default();
    let location = Location::parse("/clients?page=3").unwrap();
    let before = h.backend.write_count();

    for _ in 0..3 {
        let outcome = guard.evaluate(&h.session, &location, "clients");
        assert_eq!(outcome, GuardOutcome::Redirect("/login".into()));
    }

    assert_eq!(h.backend.write_count(), before + 1);
    assert_eq!(
        h.session.store().get_intended_destination().as_deref(),
        Some("/clients?page=3")
    );
}

#[tokio::test]
async fn test_navigation_waits_while_initializing() {
    let server = MockServer::start().await;
    let h = Harness::new(&server);

    let nav = h.navigator().navigate("/invoices").unwrap();
    assert_eq!(nav.state, NavigationState::Loading);
    assert_eq!(nav.location.path, "/invoices");
    assert!(h.session.intended_destination().is_none());
}

#[tokio::test]
async fn test_public_destination_never_replayed() {
    let server = MockServer::start().await;
    mount_login_ok(&server).await;
    let h = Harness::new(&server);
    h.session.store().set_intended_destination("/signup?ref=mail");
    h.session.reset();
    assert!(!h.session.check_session_validity().await);

    h.session.login(ada()).await.unwrap();
    let nav = h.navigator().navigate("/login").unwrap();

    assert_eq!(nav.location.path, "/dashboard");
    assert_eq!(nav.state, NavigationState::Rendered);
    assert!(h.session.store().get_intended_destination().is_none());
}

// ============================================================================
// End-to-end flows
// ============================================================================

#[tokio::test]
async fn test_deep_link_returns_after_login() {
    let server = MockServer::start().await;
    mount_login_ok(&server).await;
    let h = Harness::new(&server);
    let navigator = h.navigator();
    assert!(!h.session.check_session_validity().await);

    let nav = navigator.navigate("/clients").unwrap();
    assert_eq!(nav.location.path, "/login");
    assert_eq!(nav.state, NavigationState::Rendered);
    assert_eq!(nav.redirects, ["/login"]);
    assert_eq!(
        h.session.store().get_intended_destination().as_deref(),
        Some("/clients")
    );

    h.session.login(ada()).await.unwrap();

    let nav = navigator.navigate("/login").unwrap();
    assert_eq!(nav.location.full_path(), "/clients");
    assert_eq!(nav.state, NavigationState::Rendered);
    assert!(h.session.store().get_intended_destination().is_none());
    assert!(h.session.intended_destination().is_none());
}

#[tokio::test]
async fn test_restored_session_skips_login_page() {
    let server = MockServer::start().await;
    Mock::given(path("/dashboard/summary"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let h = Harness::new(&server).with_stored_session();

    assert!(h.session.check_session_validity().await);
    let nav = h.navigator().navigate("/login").unwrap();

    assert_eq!(nav.location.path, "/dashboard");
    assert_eq!(nav.redirects, ["/dashboard"]);
    assert_eq!(nav.state, NavigationState::Rendered);
}

#[tokio::test]
async fn test_home_renders_for_everyone() {
    let server = MockServer::start().await;
    Mock::given(path("/dashboard/summary"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let h = Harness::new(&server).with_stored_session();
    assert!(h.session.check_session_validity().await);

    let nav = h.navigator().navigate("/").unwrap();
    assert_eq!(nav.location.path, "/");
    assert!(nav.redirects.is_empty());
}
