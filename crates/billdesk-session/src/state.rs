//! Session state snapshot.

use std::fmt;

use serde::Serialize;

use billdesk_core::User;

/// Lifecycle of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    /// The stored session has not been validated yet.
    Initializing,
    Unauthenticated,
    /// A login request is in progress.
    Authenticating,
    Authenticated,
    /// The last operation failed. Not terminal.
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable view of the session.
///
/// `user` is present exactly when `status` is [`SessionStatus::Authenticated`].
/// The fields are private so every change goes through a transition that
/// keeps that pairing intact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    user: Option<User>,
    status: SessionStatus,
    error: Option<String>,
    intended_destination: Option<String>,
}

impl SessionState {
    /// State before the stored session has been checked.
    pub fn initializing(intended_destination: Option<String>) -> Self {
        Self {
            user: None,
            status: SessionStatus::Initializing,
            error: None,
            intended_destination,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn intended_destination(&self) -> Option<&str> {
        self.intended_destination.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    pub fn is_initializing(&self) -> bool {
        self.status == SessionStatus::Initializing
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    pub(crate) fn authenticating(self) -> Self {
        Self {
            user: None,
            status: SessionStatus::Authenticating,
            error: None,
            ..self
        }
    }

    pub(crate) fn authenticated(self, user: User) -> Self {
        Self {
            user: Some(user),
            status: SessionStatus::Authenticated,
            error: None,
            ..self
        }
    }

    /// Signed out, optionally keeping an explanation for the user.
    pub(crate) fn unauthenticated(self, error: Option<String>) -> Self {
        Self {
            user: None,
            status: SessionStatus::Unauthenticated,
            error,
            ..self
        }
    }

    pub(crate) fn failed(self, message: impl Into<String>) -> Self {
        Self {
            user: None,
            status: SessionStatus::Error,
            error: Some(message.into()),
            ..self
        }
    }

    pub(crate) fn with_intended_destination(self, destination: Option<String>) -> Self {
        Self {
            intended_destination: destination,
            ..self
        }
    }
}
