//! Wiring from global options to a session container.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;

use billdesk_core::{ApiUrl, SessionStore};
use billdesk_file::FileBackend;
use billdesk_http::{ClientConfig, ResilientClient};
use billdesk_session::{SessionConfig, SessionContainer};

use crate::cli::GlobalArgs;

/// Default session file location.
fn default_session_path() -> Result<PathBuf> {
    let dirs =
        ProjectDirs::from("", "", "billdesk").context("Could not determine data directory")?;

    let data_dir = dirs.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data directory")?;

    Ok(data_dir.join("session.json"))
}

/// Build the session container for one CLI invocation.
pub fn session(args: &GlobalArgs) -> Result<SessionContainer> {
    let api_url = ApiUrl::new(&args.api_url).context("Invalid API URL")?;

    let path = match &args.session_file {
        Some(path) => path.clone(),
        None => default_session_path()?,
    };
    tracing::debug!(path = %path.display(), "Using session file");
    let store = SessionStore::new(Arc::new(FileBackend::new(path)));

    let mut config = ClientConfig::new(api_url).with_timeout(Duration::from_secs(args.timeout));
    if let Some(key) = &args.api_key {
        config = config.with_service_key(key);
    }

    let client =
        ResilientClient::new(config, store.clone()).context("Failed to build HTTP client")?;
    Ok(SessionContainer::new(client, store, SessionConfig::default()))
}
