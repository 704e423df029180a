//! billdesk-file - Filesystem-backed session storage.
//!
//! Persists the session store's keys in a single JSON document so a session
//! survives process restarts.

mod backend;

pub use backend::FileBackend;
