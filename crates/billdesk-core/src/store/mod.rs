//! Durable session persistence.
//!
//! [`SessionStore`] is a typed façade over a [`StorageBackend`]. It holds the
//! cached user record, the credential pair and the intended destination.
//! Every operation is synchronous and infallible from the caller's point of
//! view: backend failures and malformed values are logged and treated as
//! empty state.

mod backend;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::StorageError;
use crate::tokens::{AccessToken, RefreshToken, TokenPair};
use crate::types::User;

pub use backend::{MemoryBackend, StorageBackend};

/// Storage keys shared with every backend.
pub mod keys {
    /// Serialized [`User`](crate::User) record.
    pub const USER: &str = "authUser";
    /// Access token.
    pub const ACCESS_TOKEN: &str = "authToken";
    /// Refresh token.
    pub const REFRESH_TOKEN: &str = "refreshToken";
    /// Path the user was heading to before authenticating.
    pub const INTENDED_DESTINATION: &str = "intendedDestination";

    /// Every key owned by the session store.
    pub const ALL: [&str; 4] = [USER, ACCESS_TOKEN, REFRESH_TOKEN, INTENDED_DESTINATION];
}

/// Typed access to the persisted session.
///
/// Cheap to clone; clones share the same backend.
#[derive(Debug, Clone)]
pub struct SessionStore {
    backend: Arc<dyn StorageBackend>,
}

impl SessionStore {
    /// Create a store over the given backend.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Create a store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    // ========================================================================
    // User
    // ========================================================================

    /// Returns the cached user, or `None` if absent or unparseable.
    pub fn get_user(&self) -> Option<User> {
        let raw = self.read(keys::USER)?;
        match serde_json::from_str::<User>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                let err = StorageError::Malformed {
                    key: keys::USER.to_string(),
                    message: e.to_string(),
                };
                warn!(error = %err, "Ignoring stored user record");
                None
            }
        }
    }

    pub fn set_user(&self, user: &User) {
        match serde_json::to_string(user) {
            Ok(json) => self.write(keys::USER, &json),
            Err(e) => {
                let err = StorageError::Serialize {
                    key: keys::USER.to_string(),
                    message: e.to_string(),
                };
                warn!(error = %err, "Failed to persist user record");
            }
        }
    }

    pub fn clear_user(&self) {
        self.delete(keys::USER);
    }

    // ========================================================================
    // Tokens
    // ========================================================================

    /// Returns the stored credential pair, or `None` without an access token.
    pub fn get_tokens(&self) -> Option<TokenPair> {
        let access = self.read(keys::ACCESS_TOKEN)?;
        let refresh = self.read(keys::REFRESH_TOKEN);
        Some(TokenPair::new(
            AccessToken::new(access),
            refresh.map(RefreshToken::new),
        ))
    }

    /// Persist a new access token.
    ///
    /// When `refresh` is `None` the previously stored refresh token is kept.
    pub fn set_tokens(&self, access: &AccessToken, refresh: Option<&RefreshToken>) {
        self.write(keys::ACCESS_TOKEN, access.as_str());
        if let Some(refresh) = refresh {
            self.write(keys::REFRESH_TOKEN, refresh.as_str());
        }
    }

    pub fn clear_tokens(&self) {
        self.delete(keys::ACCESS_TOKEN);
        self.delete(keys::REFRESH_TOKEN);
    }

    // ========================================================================
    // Intended destination
    // ========================================================================

    pub fn get_intended_destination(&self) -> Option<String> {
        self.read(keys::INTENDED_DESTINATION)
    }

    pub fn set_intended_destination(&self, path: &str) {
        self.write(keys::INTENDED_DESTINATION, path);
    }

    pub fn clear_intended_destination(&self) {
        self.delete(keys::INTENDED_DESTINATION);
    }

    /// Remove the user, the tokens and the intended destination.
    pub fn clear_all(&self) {
        debug!("Clearing persisted session");
        for key in keys::ALL {
            self.delete(key);
        }
    }

    // Empty values read as absent.
    fn read(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(Some(value)) if !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(e) => {
                warn!(key, error = %e, "Session store read failed");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.backend.set(key, value) {
            warn!(key, error = %e, "Session store write failed");
        }
    }

    fn delete(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            warn!(key, error = %e, "Session store remove failed");
        }
    }
}
