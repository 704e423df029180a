//! Client configuration.

use std::fmt;
use std::time::Duration;

use billdesk_core::ApiUrl;

use crate::endpoints::REFRESH;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pause before the single retry of a transient failure.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Header carrying the static service credential.
pub const SERVICE_KEY_HEADER: &str = "x-api-key";

/// Settings for a [`ResilientClient`](crate::ResilientClient).
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL every request path is joined onto.
    pub base_url: ApiUrl,
    /// Static service credential sent on every call, if any.
    pub service_key: Option<String>,
    /// Per-call timeout. A timeout counts as a network failure.
    pub timeout: Duration,
    /// Pause before retrying a network failure or a 5xx.
    pub retry_delay: Duration,
    /// Path of the token refresh endpoint.
    pub refresh_path: String,
    /// User-Agent header value.
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(base_url: ApiUrl) -> Self {
        Self {
            base_url,
            service_key: None,
            timeout: DEFAULT_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
            refresh_path: REFRESH.to_string(),
            user_agent: concat!("billdesk/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn with_service_key(mut self, key: impl Into<String>) -> Self {
        self.service_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

// Keep the service key out of logs
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("service_key", &self.service_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("retry_delay", &self.retry_delay)
            .field("refresh_path", &self.refresh_path)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
