//! Error types for billdesk.
//!
//! This module provides a unified error type with explicit variants for
//! transport, server, client, authentication, validation, storage and input
//! errors. Errors are `Clone` so one failure can be handed to every request
//! waiting on the same credential refresh.

use std::fmt;
use thiserror::Error;

/// The unified error type for billdesk operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// No response was received (connection, DNS, TLS, timeout).
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    /// The server answered with a 5xx status.
    #[error("server error: {0}")]
    Server(ResponseError),

    /// The server answered with a 4xx status other than 401.
    #[error("client error: {0}")]
    Client(ResponseError),

    /// A 401 that a credential refresh could not resolve.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Login was rejected with a user-facing message.
    #[error("validation error: {message}")]
    Validation {
        status: Option<u16>,
        message: String,
    },

    /// Malformed or unreadable persisted data.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation errors (URLs, paths).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
}

impl Error {
    /// Build a validation error.
    pub fn validation(status: Option<u16>, message: impl Into<String>) -> Self {
        Error::Validation {
            status,
            message: message.into(),
        }
    }

    /// The HTTP status associated with this error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Server(e) | Error::Client(e) => Some(e.status),
            Error::Auth(e) => e.status(),
            Error::Validation { status, .. } => *status,
            Error::Network(_) | Error::Storage(_) | Error::InvalidInput(_) => None,
        }
    }

    /// The human-readable message, without the category prefix.
    pub fn message(&self) -> String {
        match self {
            Error::Server(e) | Error::Client(e) => e.message.clone(),
            Error::Validation { message, .. } => message.clone(),
            Error::Network(e) => e.to_string(),
            Error::Auth(e) => e.to_string(),
            Error::Storage(e) => e.to_string(),
            Error::InvalidInput(e) => e.to_string(),
        }
    }

    /// True when no response was received at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::Network(_))
    }

    /// True when the server rejected the caller's credentials.
    pub fn is_authorization(&self) -> bool {
        match self {
            Error::Auth(_) => true,
            Error::Client(e) => e.status == 403,
            _ => false,
        }
    }
}

/// Transport-level errors: the request never produced a response.
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Any other failure before a status line was read.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// A non-success HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseError {
    /// HTTP status code.
    pub status: u16,
    /// Machine-readable error code from the body (if present).
    pub code: Option<String>,
    /// Human-readable message.
    pub message: String,
}

impl ResponseError {
    /// Create a new response error.
    pub fn new(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// Derive an error from a response body.
    ///
    /// The message comes from the JSON `message` field, then the JSON `error`
    /// field, then a short plain-text body, then `reason`.
    pub fn from_body(status: u16, reason: Option<&str>, body: &[u8]) -> Self {
        let fallback = || match reason {
            Some(reason) => reason.to_string(),
            None => format!("request failed with status {}", status),
        };

        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
            let code = value
                .get("error")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            let message = value
                .get("message")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .or_else(|| code.clone())
                .unwrap_or_else(fallback);
            return Self::new(status, code, message);
        }

        let text = String::from_utf8_lossy(body);
        let text = text.trim();
        if !text.is_empty() && text.len() <= 512 {
            Self::new(status, None, text)
        } else {
            Self::new(status, None, fallback())
        }
    }

    /// Returns true for 5xx statuses.
    pub fn is_server(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref code) = self.code {
            if code != &self.message {
                write!(f, " [{}]", code)?;
            }
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for ResponseError {}

/// Authentication-related errors.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The server returned 401 and no refresh could resolve it.
    #[error("unauthorized: {message}")]
    Unauthorized { status: u16, message: String },

    /// No refresh token is stored, so the access token cannot be renewed.
    #[error("no refresh token available")]
    MissingRefreshToken,

    /// The refresh endpoint rejected the refresh token or failed.
    #[error("token refresh failed: {message}")]
    RefreshFailed {
        status: Option<u16>,
        message: String,
    },
}

impl AuthError {
    /// The HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::Unauthorized { status, .. } => Some(*status),
            AuthError::RefreshFailed { status, .. } => *status,
            AuthError::MissingRefreshToken => None,
        }
    }
}

/// Persisted-data errors. Always absorbed by the session store.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The backend could not be read or written.
    #[error("storage I/O failed: {message}")]
    Io { message: String },

    /// A stored value could not be parsed.
    #[error("malformed value for '{key}': {message}")]
    Malformed { key: String, message: String },

    /// A value could not be serialized.
    #[error("failed to serialize '{key}': {message}")]
    Serialize { key: String, message: String },
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io {
            message: err.to_string(),
        }
    }
}

/// Input validation errors.
#[derive(Debug, Clone, Error)]
pub enum InvalidInputError {
    /// Invalid API base URL.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// Invalid request or route path.
    #[error("invalid path '{value}': {reason}")]
    Path { value: String, reason: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}
