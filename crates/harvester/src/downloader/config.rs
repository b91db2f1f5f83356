//! Configuration types for the harvesting pipeline
//!
//! Provider secrets are read once, at startup, into [`Credentials`] and then
//! handed to each resolver's constructor. Nothing below this module touches
//! the process environment.

use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::downloader::core::{HarvestError, Result};

pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const DROPBOX_ACCESS_TOKEN: &str = "DROPBOX_ACCESS_TOKEN";
pub const IMGUR_CLIENT_ID: &str = "IMGUR_CLIENT_ID";

/// What the dispatcher does when a provider recognises a URL but fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
    /// Treat the failure like a decline and try the next provider
    #[default]
    FallThrough,
    /// Surface the provider's error immediately
    StopOnFailure,
}

/// Configuration for resolution and download operations
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Root directory every ID-path is placed under
    pub destination: PathBuf,
    /// Report what would be downloaded without touching the filesystem
    pub dry_run: bool,
    pub connect_timeout: Duration,
    /// Whole-request timeout; `None` lets large transfers run as long as they need
    pub timeout: Option<Duration>,
    pub user_agent: String,
    /// Retries for transient failures; 0 disables retrying
    pub max_retries: usize,
    /// Initial delay between retries (doubles each retry)
    pub retry_delay: Duration,
    /// Maximum retry delay cap
    pub max_retry_delay: Duration,
    pub max_concurrent_downloads: usize,
    pub dispatch_policy: DispatchPolicy,
}

impl HarvestConfig {
    pub fn builder() -> HarvestConfigBuilder {
        HarvestConfigBuilder::new()
    }

    /// Delay before the given retry attempt (0-based), using exponential backoff
    pub fn get_retry_delay(&self, attempt: usize) -> Duration {
        let delay = (self.retry_delay.as_millis() as u64).saturating_mul(2_u64.saturating_pow(attempt as u32));
        Duration::from_millis(delay.min(self.max_retry_delay.as_millis() as u64))
    }

    /// Full backoff schedule, one entry per retry
    pub fn retry_schedule(&self) -> Vec<Duration> {
        (0..self.max_retries).map(|attempt| self.get_retry_delay(attempt)).collect()
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            destination: PathBuf::from("downloads"),
            dry_run: false,
            connect_timeout: Duration::from_secs(30),
            timeout: None,
            user_agent: concat!("harvester/", env!("CARGO_PKG_VERSION")).to_string(),
            max_retries: 0,
            retry_delay: Duration::from_millis(1000),
            max_retry_delay: Duration::from_secs(60),
            max_concurrent_downloads: 1,
            dispatch_policy: DispatchPolicy::FallThrough,
        }
    }
}

/// Builder for [`HarvestConfig`]
#[derive(Debug, Clone, Default)]
pub struct HarvestConfigBuilder {
    config: HarvestConfig,
}

impl HarvestConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn destination<P: Into<PathBuf>>(mut self, destination: P) -> Self {
        self.config.destination = destination.into();
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration, max_delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self.config.max_retry_delay = max_delay;
        self
    }

    pub fn max_concurrent_downloads(mut self, max: usize) -> Self {
        self.config.max_concurrent_downloads = max;
        self
    }

    pub fn dispatch_policy(mut self, policy: DispatchPolicy) -> Self {
        self.config.dispatch_policy = policy;
        self
    }

    pub fn build(self) -> Result<HarvestConfig> {
        if self.config.max_concurrent_downloads == 0 {
            return Err(HarvestError::Configuration {
                message: "max_concurrent_downloads must be at least 1".to_string(),
                field: Some("max_concurrent_downloads".to_string()),
                suggestion: Some("Use 1 for strictly sequential downloads".to_string()),
            });
        }
        if self.config.retry_delay > self.config.max_retry_delay {
            return Err(HarvestError::Configuration {
                message: "retry_delay is larger than max_retry_delay".to_string(),
                field: Some("retry_delay".to_string()),
                suggestion: None,
            });
        }
        Ok(self.config)
    }
}

/// Provider-issued secrets
#[derive(Clone, Default)]
pub struct Credentials {
    pub google_api_key: Option<String>,
    pub dropbox_access_token: Option<String>,
    pub imgur_client_id: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("google_api_key", &self.google_api_key.as_ref().map(|_| "<redacted>"))
            .field("dropbox_access_token", &self.dropbox_access_token.as_ref().map(|_| "<redacted>"))
            .field("imgur_client_id", &self.imgur_client_id.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Read every provider secret from the environment, after loading `.env` if present
    pub fn from_env() -> Self {
        if dotenv::dotenv().is_ok() {
            debug!("Loaded environment variables from .env file");
        }

        let read = |name: &str| std::env::var(name).ok().filter(|value| !value.trim().is_empty());
        Self {
            google_api_key: read(GOOGLE_API_KEY),
            dropbox_access_token: read(DROPBOX_ACCESS_TOKEN),
            imgur_client_id: read(IMGUR_CLIENT_ID),
        }
    }
}

/// Look up a secret a provider cannot work without
pub(crate) fn require_secret<'a>(secret: Option<&'a str>, variable: &str) -> Result<&'a str> {
    secret.ok_or_else(|| HarvestError::Configuration {
        message: format!("{} environment variable not set", variable),
        field: Some(variable.to_string()),
        suggestion: Some(format!("Set {} in your environment or .env file", variable)),
    })
}

/// API base URLs, one per remote service
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    pub google_apis: String,
    pub dropbox_api: String,
    pub dropbox_content: String,
    pub imgur_api: String,
}

impl Endpoints {
    /// Point every service at the same base URL
    pub fn all<S: Into<String>>(base: S) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self {
            google_apis: base.clone(),
            dropbox_api: base.clone(),
            dropbox_content: base.clone(),
            imgur_api: base,
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            google_apis: "https://www.googleapis.com".to_string(),
            dropbox_api: "https://api.dropboxapi.com".to_string(),
            dropbox_content: "https://content.dropboxapi.com".to_string(),
            imgur_api: "https://api.imgur.com".to_string(),
        }
    }
}
