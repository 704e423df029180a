//! Request descriptions and buffered responses.

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use billdesk_core::error::{AuthError, Error, NetworkError, ResponseError};
use billdesk_core::{AccessToken, Result};

/// Per-request behavior switches.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Do not attempt a token refresh on 401 (login, logout).
    pub skip_refresh: bool,
    /// Do not retry network failures or 5xx responses.
    pub skip_retry: bool,
    /// Send this access token instead of the stored one.
    pub bearer: Option<AccessToken>,
    /// Extra headers appended to the request.
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip_refresh(mut self) -> Self {
        self.skip_refresh = true;
        self
    }

    pub fn skip_retry(mut self) -> Self {
        self.skip_retry = true;
        self
    }

    /// Authenticate with `token` instead of the stored one. A 401 is then
    /// returned as is, without a refresh.
    pub fn with_bearer(mut self, token: AccessToken) -> Self {
        self.bearer = Some(token);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Whether a request is an ordinary API call or the refresh call itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestKind {
    Api,
    Refresh,
}

/// A replayable description of one outbound call.
#[derive(Debug, Clone)]
pub(crate) struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub options: RequestOptions,
    pub kind: RequestKind,
}

impl ApiRequest {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            body,
            options,
            kind: RequestKind::Api,
        }
    }

    pub fn refresh(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
            options: RequestOptions::new().skip_refresh().skip_retry(),
            kind: RequestKind::Refresh,
        }
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body as JSON. An empty body decodes as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let body: &[u8] = if self.body.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &self.body
        };
        serde_json::from_slice(body).map_err(|e| {
            NetworkError::Http {
                message: format!("invalid response body: {}", e),
            }
            .into()
        })
    }

    /// Describe a non-success response.
    pub fn to_response_error(&self) -> ResponseError {
        ResponseError::from_body(
            self.status.as_u16(),
            self.status.canonical_reason(),
            &self.body,
        )
    }

    /// Map the response onto the error taxonomy without any recovery.
    pub(crate) fn into_result(self) -> Result<ApiResponse> {
        if self.is_success() {
            return Ok(self);
        }

        let error = self.to_response_error();
        Err(if self.status == StatusCode::UNAUTHORIZED {
            Error::Auth(AuthError::Unauthorized {
                status: error.status,
                message: error.message,
            })
        } else if self.status.is_server_error() {
            Error::Server(error)
        } else {
            Error::Client(error)
        })
    }
}
