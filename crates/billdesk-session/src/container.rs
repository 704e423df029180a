//! Reactive session container.

use std::fmt;
use std::sync::{Arc, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use billdesk_core::error::{AuthError, Error};
use billdesk_core::{AccessToken, Credentials, RefreshToken, Result, SessionStore, User};
use billdesk_http::endpoints::{self, LoginRequest, LoginResponse};
use billdesk_http::{Method, RequestOptions, ResilientClient};

use crate::state::{SessionState, SessionStatus};

/// Message shown after the server rejected a stored or refreshed session.
const SESSION_EXPIRED: &str = "session expired";

/// Endpoint paths used by the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub login_path: String,
    pub logout_path: String,
    /// Protected endpoint probed when restoring a stored session.
    pub probe_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_path: endpoints::LOGIN.to_string(),
            logout_path: endpoints::LOGOUT.to_string(),
            probe_path: endpoints::DASHBOARD_SUMMARY.to_string(),
        }
    }
}

/// Owner of the session state.
///
/// Cloning is cheap and every clone observes the same state. Changes are
/// published on a [`watch`] channel, so views can either take a snapshot
/// with [`state`](Self::state) or follow updates via
/// [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct SessionContainer {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    client: ResilientClient,
    store: SessionStore,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
}

impl SessionContainer {
    /// Create a container in the `Initializing` state.
    ///
    /// The intended destination is restored from `store`. The container
    /// registers itself with `client` so a failed token refresh signs the
    /// user out.
    pub fn new(client: ResilientClient, store: SessionStore, config: SessionConfig) -> Self {
        let initial = SessionState::initializing(store.get_intended_destination());
        let (state, _) = watch::channel(initial);

        let inner = Arc::new(ContainerInner {
            client,
            store,
            config,
            state,
        });

        let weak: Weak<ContainerInner> = Arc::downgrade(&inner);
        inner.client.on_session_terminated(move |reason| {
            if let Some(inner) = weak.upgrade() {
                inner.session_terminated(reason);
            }
        });

        Self { inner }
    }

    pub fn client(&self) -> &ResilientClient {
        &self.inner.client
    }

    pub fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Put the state back to `Initializing`, re-reading the intended
    /// destination from the store. Stored session data is left alone.
    pub fn reset(&self) {
        let destination = self.inner.store.get_intended_destination();
        self.inner
            .state
            .send_replace(SessionState::initializing(destination));
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Exchange credentials for a session.
    ///
    /// # Errors
    ///
    /// Rejected credentials and incomplete success bodies surface as
    /// [`Error::Validation`]; they leave stored data untouched and, when a
    /// session was already active, keep it active. Any other failure moves
    /// the state to `Error`.
    #[instrument(skip(self, credentials), fields(email = %credentials.email()))]
    pub async fn login(&self, credentials: Credentials) -> Result<()> {
        let previous = self.state();
        self.inner.transition(SessionState::authenticating);

        match self.authenticate(&credentials).await {
            Ok(user) => {
                info!(user_id = %user.id, "Logged in");
                self.inner.transition(|s| s.authenticated(user));
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Login failed");
                let kept_user = match err {
                    Error::Validation { .. } if previous.is_authenticated() => {
                        previous.user().cloned()
                    }
                    _ => None,
                };
                match kept_user {
                    Some(user) => self.inner.transition(|s| s.authenticated(user)),
                    None => {
                        let message = err.message();
                        self.inner.transition(|s| s.failed(message));
                    }
                }
                Err(err)
            }
        }
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<User> {
        let body = serde_json::to_value(LoginRequest {
            email: credentials.email(),
            password: credentials.password(),
        })
        .map_err(|e| Error::validation(None, format!("could not encode credentials: {}", e)))?;

        let response = self
            .inner
            .client
            .request(
                Method::POST,
                &self.inner.config.login_path,
                Some(body),
                RequestOptions::new().skip_refresh(),
            )
            .await
            .map_err(rejected_login)?;

        let payload: LoginResponse = response.json().unwrap_or_else(|e| {
            debug!(error = %e, "Unreadable login response");
            LoginResponse::default()
        });

        let user = payload
            .user
            .ok_or_else(|| Error::validation(None, "login response did not include a user"))?;
        let access = payload.access_token.ok_or_else(|| {
            Error::validation(None, "login response did not include an access token")
        })?;

        let refresh = payload.refresh_token.map(RefreshToken::new);
        self.inner.store.set_user(&user);
        self.inner
            .store
            .set_tokens(&AccessToken::new(access), refresh.as_ref());
        Ok(user)
    }

    /// Sign out locally and tell the server in the background.
    ///
    /// Local state is cleared before returning. The server call carries the
    /// token that was active at the time, is never retried or refreshed, and
    /// its outcome is ignored. Without a Tokio runtime the server call is
    /// skipped. The returned handle lets short-lived callers wait for it.
    pub fn logout(&self) -> Option<JoinHandle<()>> {
        let token = self.inner.store.get_tokens().map(|pair| pair.access);

        self.inner.store.clear_all();
        self.inner.transition(|s| {
            s.unauthenticated(None).with_intended_destination(None)
        });
        info!("Logged out");

        token.and_then(|token| self.notify_logout(token))
    }

    fn notify_logout(&self, token: AccessToken) -> Option<JoinHandle<()>> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime available, skipping server logout");
            return None;
        };

        let client = self.inner.client.clone();
        let path = self.inner.config.logout_path.clone();
        let task = handle.spawn(async move {
            let options = RequestOptions::new()
                .with_bearer(token)
                .skip_refresh()
                .skip_retry();
            if let Err(e) = client.request(Method::POST, &path, None, options).await {
                debug!(error = %e, "Server logout failed");
            }
        });
        Some(task)
    }

    /// Confirm the stored session with the server.
    ///
    /// Returns whether the user ends up signed in. Connectivity problems and
    /// server errors keep the stored session (fail open); an authorization
    /// failure clears it (fail closed).
    #[instrument(skip(self))]
    pub async fn check_session_validity(&self) -> bool {
        let Some(user) = self.inner.store.get_user() else {
            debug!("No stored user");
            self.inner.transition(|s| s.unauthenticated(None));
            return false;
        };

        let probe = self
            .inner
            .client
            .request(
                Method::GET,
                &self.inner.config.probe_path,
                None,
                RequestOptions::new(),
            )
            .await;

        match probe {
            Ok(_) => {
                info!(user_id = %user.id, "Session restored");
                self.inner.transition(|s| s.authenticated(user));
                true
            }
            Err(err) if err.is_authorization() => {
                info!(error = %err, "Stored session rejected");
                self.inner.store.clear_all();
                self.inner.transition(|s| {
                    s.failed(SESSION_EXPIRED).with_intended_destination(None)
                });
                self.inner
                    .transition(|s| s.unauthenticated(Some(SESSION_EXPIRED.to_string())));
                false
            }
            Err(err) => {
                warn!(error = %err, "Could not verify session, keeping stored session");
                self.inner.transition(|s| s.authenticated(user));
                true
            }
        }
    }

    // ========================================================================
    // Intended destination
    // ========================================================================

    /// The path to return to after login, if one was captured.
    pub fn intended_destination(&self) -> Option<String> {
        self.inner.state.borrow().intended_destination().map(str::to_string)
    }

    pub fn set_intended_destination(&self, path: &str) {
        self.inner.store.set_intended_destination(path);
        let path = path.to_string();
        self.inner
            .transition(|s| s.with_intended_destination(Some(path)));
    }

    pub fn clear_intended_destination(&self) {
        self.inner.store.clear_intended_destination();
        self.inner.transition(|s| s.with_intended_destination(None));
    }
}

impl ContainerInner {
    fn transition<F>(&self, change: F)
    where
        F: FnOnce(SessionState) -> SessionState,
    {
        self.state.send_modify(|state| {
            let from = state.status();
            *state = change(state.clone());
            if from != state.status() {
                debug!(%from, to = %state.status(), "Session transition");
            }
        });
    }

    /// The HTTP client gave up on the session and already dropped the
    /// stored user and tokens. The intended destination survives so the
    /// next login can return to it.
    fn session_terminated(&self, reason: &AuthError) {
        let was_authenticated = self.state.borrow().status() == SessionStatus::Authenticated;
        if was_authenticated {
            info!(%reason, "Session terminated");
            self.transition(|s| s.unauthenticated(Some(SESSION_EXPIRED.to_string())));
        } else {
            debug!(%reason, "Session terminated while signed out");
        }
    }
}

impl fmt::Debug for SessionContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContainer")
            .field("status", &self.inner.state.borrow().status())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Credential rejections are validation failures, not session failures.
fn rejected_login(err: Error) -> Error {
    match err {
        Error::Client(response) => Error::validation(Some(response.status), response.message),
        Error::Auth(AuthError::Unauthorized { status, message }) => {
            Error::validation(Some(status), message)
        }
        other => other,
    }
}
