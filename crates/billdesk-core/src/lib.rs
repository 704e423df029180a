//! billdesk-core - Core session types, errors and the session store.
//!
//! Everything the HTTP client, the session container and the route guards
//! share lives here: the user record, the credential pair, the error
//! taxonomy, and the durable [`SessionStore`] with its pluggable backends.

pub mod credentials;
pub mod error;
pub mod store;
pub mod tokens;
pub mod types;

pub use credentials::Credentials;
pub use error::Error;
pub use store::{MemoryBackend, SessionStore, StorageBackend};
pub use tokens::{AccessToken, RefreshToken, TokenPair};
pub use types::{ApiUrl, User};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
