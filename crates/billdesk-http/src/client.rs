//! Resilient HTTP client implementation.

use std::sync::{Arc, Mutex, PoisonError};

use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, trace, warn};

use billdesk_core::error::{AuthError, Error, InvalidInputError, NetworkError};
use billdesk_core::{AccessToken, RefreshToken, Result, SessionStore};

use crate::config::{ClientConfig, SERVICE_KEY_HEADER};
use crate::endpoints::{RefreshRequest, RefreshResponse};
use crate::refresh::{Admission, Epoch, RefreshGate};
use crate::request::{ApiRequest, ApiResponse, RequestKind, RequestOptions};

type TerminationHook = Arc<dyn Fn(&AuthError) + Send + Sync>;

/// HTTP client for the billing API.
///
/// Every call carries the stored access token and the service key. A 401
/// triggers at most one refresh at a time; requests failing while it runs
/// wait in a queue and are replayed in arrival order with the new token. A
/// network failure or 5xx is retried once after the configured delay.
///
/// Clones share the same connection pool, store and refresh state.
///
/// # Example
///
/// ```no_run
/// use billdesk_core::{ApiUrl, SessionStore};
/// use billdesk_http::{ClientConfig, ResilientClient};
///
/// # async fn example() -> Result<(), billdesk_core::Error> {
/// let config = ClientConfig::new(ApiUrl::new("https://billing.example.com/api")?);
/// let client = ResilientClient::new(config, SessionStore::in_memory())?;
/// let summary: serde_json::Value = client.get_json("/dashboard/summary").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ResilientClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    config: ClientConfig,
    store: SessionStore,
    gate: RefreshGate,
    termination_hooks: Mutex<Vec<TerminationHook>>,
}

impl ResilientClient {
    /// Create a client that reads and writes tokens through `store`.
    pub fn new(config: ClientConfig, store: SessionStore) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| NetworkError::Http {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                config,
                store,
                gate: RefreshGate::default(),
                termination_hooks: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    /// Returns true while a token refresh is running.
    pub fn refresh_in_flight(&self) -> bool {
        self.inner.gate.in_flight()
    }

    /// Number of requests parked until the running refresh settles.
    pub fn pending_requests(&self) -> usize {
        self.inner.gate.pending()
    }

    /// Register a callback fired when a failed refresh ends the session.
    ///
    /// By the time it runs the stored user and tokens have been cleared. The
    /// intended destination is left in place. Fires once per ended session.
    pub fn on_session_terminated<F>(&self, hook: F)
    where
        F: Fn(&AuthError) + Send + Sync + 'static,
    {
        self.inner
            .termination_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(hook));
    }

    // ========================================================================
    // Public request API
    // ========================================================================

    /// Send a request and return the buffered response.
    ///
    /// # Errors
    ///
    /// - [`Error::Network`] when no response arrived, after one retry
    /// - [`Error::Server`] for a 5xx, after one retry
    /// - [`Error::Client`] for a 4xx other than 401, never retried
    /// - [`Error::Auth`] for a 401 a refresh could not resolve
    #[instrument(skip(self, body, options))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        self.execute(ApiRequest::new(method, path, body, options))
            .await
    }

    /// GET a JSON resource.
    pub async fn get_json<R>(&self, path: &str) -> Result<R>
    where
        R: DeserializeOwned,
    {
        self.request(Method::GET, path, None, RequestOptions::new())
            .await?
            .json()
    }

    /// POST a JSON body and decode the JSON reply.
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send_json(Method::POST, path, body, RequestOptions::new())
            .await
    }

    /// Send a JSON body with explicit method and options.
    pub async fn send_json<B, R>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = to_json(body)?;
        self.request(method, path, Some(body), options)
            .await?
            .json()
    }

    // ========================================================================
    // Resilience
    // ========================================================================

    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut retried = false;

        loop {
            let epoch = self.inner.gate.epoch();
            let token = self.token_for(&request);
            let attempt = self.send_once(&request, token.as_ref()).await;

            let transient = match &attempt {
                Ok(response) => response.status().is_server_error(),
                Err(e) => e.is_connectivity(),
            };

            if transient && !retried && !request.options.skip_retry {
                retried = true;
                match &attempt {
                    Ok(response) => warn!(status = %response.status(), "Server error, retrying once"),
                    Err(e) => warn!(error = %e, "Network failure, retrying once"),
                }
                tokio::time::sleep(self.inner.config.retry_delay).await;
                continue;
            }

            let response = attempt?;

            if response.status() == StatusCode::UNAUTHORIZED
                && !retried
                && !request.options.skip_refresh
                && request.options.bearer.is_none()
                && request.kind == RequestKind::Api
            {
                return self
                    .recover_unauthorized(request, response, epoch, token.is_some())
                    .await;
            }

            return response.into_result();
        }
    }

    /// Park a request that hit a 401 until fresh tokens are available.
    ///
    /// The 401 is returned as is when the request carried no token or the
    /// session it was sent under has already ended.
    async fn recover_unauthorized(
        &self,
        request: ApiRequest,
        response: ApiResponse,
        epoch: Epoch,
        authenticated: bool,
    ) -> Result<ApiResponse> {
        if !authenticated || self.inner.gate.ended_since(epoch) {
            debug!(authenticated, "Unauthorized without a live session");
            return response.into_result();
        }
        if !self.inner.gate.in_flight() && !self.has_refresh_token() {
            let err = AuthError::MissingRefreshToken;
            self.end_session(&err);
            return Err(err.into());
        }

        match self.inner.gate.admit(request.clone(), epoch) {
            Admission::Ended => response.into_result(),
            Admission::Rotated => {
                debug!("Tokens rotated while the request was in flight, replaying");
                let token = self.token_for(&request);
                self.replay(&request, token.as_ref()).await
            }
            Admission::Queued { reply, leader } => {
                if leader {
                    let client = self.clone();
                    tokio::spawn(async move { client.run_refresh_cycle().await });
                } else {
                    debug!(
                        pending = self.inner.gate.pending(),
                        "Refresh already in flight, queued"
                    );
                }

                reply.await.unwrap_or_else(|_| {
                    Err(AuthError::RefreshFailed {
                        status: None,
                        message: "refresh ended without replaying the request".to_string(),
                    }
                    .into())
                })
            }
        }
    }

    /// Refresh once, then settle every parked request.
    async fn run_refresh_cycle(self) {
        match self.refresh_tokens().await {
            Ok(access) => {
                self.inner.gate.complete();
                while let Some(pending) = self.inner.gate.next() {
                    if pending.reply.is_closed() {
                        trace!(path = %pending.request.path, "Waiter dropped, skipping replay");
                        continue;
                    }
                    let result = self.replay(&pending.request, Some(&access)).await;
                    let _ = pending.reply.send(result);
                }
            }
            Err(err) => self.end_session(&err),
        }
    }

    /// Drop the stored user and tokens, notify hooks and reject the queue.
    fn end_session(&self, err: &AuthError) {
        warn!(error = %err, "Refresh impossible, ending session");
        self.inner.store.clear_user();
        self.inner.store.clear_tokens();
        let parked = self.inner.gate.abort();
        self.notify_terminated(err);
        for pending in parked {
            let _ = pending.reply.send(Err(Error::Auth(err.clone())));
        }
    }

    fn has_refresh_token(&self) -> bool {
        self.inner
            .store
            .get_tokens()
            .is_some_and(|tokens| tokens.refresh.is_some())
    }

    #[instrument(skip(self))]
    async fn refresh_tokens(&self) -> std::result::Result<AccessToken, AuthError> {
        let refresh = self
            .inner
            .store
            .get_tokens()
            .and_then(|tokens| tokens.refresh)
            .ok_or(AuthError::MissingRefreshToken)?;

        info!("Refreshing access token");

        let body = to_json(&RefreshRequest {
            refresh_token: refresh.as_str(),
        })
        .map_err(|e| refresh_failed(None, e.to_string()))?;
        let request = ApiRequest::refresh(self.inner.config.refresh_path.clone(), body);

        let response = self
            .send_once(&request, None)
            .await
            .map_err(|e| refresh_failed(None, e.to_string()))?;

        if !response.is_success() {
            let error = response.to_response_error();
            return Err(refresh_failed(Some(error.status), error.message));
        }

        let parsed: RefreshResponse = response
            .json()
            .map_err(|e| refresh_failed(Some(response.status().as_u16()), e.to_string()))?;

        let access = AccessToken::new(parsed.access_token);
        let refresh = parsed.refresh_token.map(RefreshToken::new);
        self.inner.store.set_tokens(&access, refresh.as_ref());

        debug!("Access token refreshed");
        Ok(access)
    }

    /// Final attempt for a request: no retry, no refresh.
    async fn replay(&self, request: &ApiRequest, token: Option<&AccessToken>) -> Result<ApiResponse> {
        self.send_once(request, token).await?.into_result()
    }

    fn notify_terminated(&self, err: &AuthError) {
        let hooks: Vec<TerminationHook> = self
            .inner
            .termination_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for hook in hooks {
            hook(err);
        }
    }

    // ========================================================================
    // Transport
    // ========================================================================

    fn token_for(&self, request: &ApiRequest) -> Option<AccessToken> {
        if request.kind == RequestKind::Refresh {
            return None;
        }
        request
            .options
            .bearer
            .clone()
            .or_else(|| self.inner.store.get_tokens().map(|tokens| tokens.access))
    }

    /// One network round trip. Only transport failures are errors here.
    async fn send_once(
        &self,
        request: &ApiRequest,
        token: Option<&AccessToken>,
    ) -> Result<ApiResponse> {
        let url = self.inner.config.base_url.endpoint(&request.path);
        debug!(method = %request.method, %url, "Sending request");

        let mut builder = self.inner.http.request(request.method.clone(), &url);

        if let Some(ref key) = self.inner.config.service_key {
            builder = builder.header(SERVICE_KEY_HEADER, header_value(key)?);
        }
        if let Some(token) = token {
            builder = builder.header(
                AUTHORIZATION,
                header_value(&format!("Bearer {}", token.as_str()))?,
            );
        }
        for (name, value) in &request.options.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                InvalidInputError::Other {
                    message: format!("invalid header name '{}': {}", name, e),
                }
            })?;
            builder = builder.header(name, header_value(value)?);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.network_error(e))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.network_error(e))?;

        trace!(%status, bytes = body.len(), "Response received");
        Ok(ApiResponse::new(status, headers, body.to_vec()))
    }

    fn network_error(&self, err: reqwest::Error) -> Error {
        let err = if err.is_timeout() {
            NetworkError::Timeout {
                duration_ms: u64::try_from(self.inner.config.timeout.as_millis())
                    .unwrap_or(u64::MAX),
            }
        } else if err.is_connect() {
            NetworkError::Connection {
                message: err.to_string(),
            }
        } else {
            NetworkError::Http {
                message: err.to_string(),
            }
        };
        Error::Network(err)
    }
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("config", &self.inner.config)
            .field("refresh_in_flight", &self.inner.gate.in_flight())
            .finish()
    }
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| {
        InvalidInputError::Other {
            message: format!("failed to serialize request body: {}", e),
        }
        .into()
    })
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| {
        InvalidInputError::Other {
            message: "header value contains invalid characters".to_string(),
        }
        .into()
    })
}

fn refresh_failed(status: Option<u16>, message: String) -> AuthError {
    AuthError::RefreshFailed { status, message }
}
