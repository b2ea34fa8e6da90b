//! Configuration management
//!
//! [`DatagrowthConfig`] holds process-wide settings that get injected into
//! fetchers, resource clients and the growth driver at construction time.
//! [`GrowthConfig`] is the per-growth configuration blob.

use humantime_serde::re::humantime::parse_duration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, ErrorCode, Result};
use crate::organism::Kwargs;

pub mod growth;

pub use growth::GrowthConfig;

/// Top-level configuration, usually read from `datagrowth.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatagrowthConfig {
    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub tasks: TaskSettings,

    /// Defaults merged into every growth configuration
    #[serde(default)]
    pub growth: Kwargs,
}

/// Settings for outgoing HTTP requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Total request timeout
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    /// Connect timeout
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Proxy applied to all schemes
    #[serde(default)]
    pub proxy: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
            proxy: None,
        }
    }
}

/// Resource cache policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// When set, fetched resources get a purge time this far in the future
    #[serde(with = "humantime_serde", default)]
    pub purge_after: Option<Duration>,
}

/// Settings for the task backend and poll driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSettings {
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Maximum concurrent fetches within a batch task
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    format!("datagrowth/{}", env!("CARGO_PKG_VERSION"))
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_concurrency() -> usize {
    4
}

impl DatagrowthConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config_with_code(
                ErrorCode::CONFIG_NOT_FOUND,
                format!("Failed to read configuration file {}", path.display()),
            )
            .with_source(e)
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Apply overrides from `DATAGROWTH_*` environment variables
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(proxy) = lookup("DATAGROWTH_HTTP_PROXY") {
            self.http.proxy = Some(proxy);
        }
        if let Some(agent) = lookup("DATAGROWTH_USER_AGENT") {
            self.http.user_agent = agent;
        }
        if let Some(timeout) = lookup("DATAGROWTH_HTTP_TIMEOUT") {
            self.http.timeout = parse_duration(&timeout).map_err(|e| {
                Error::config_with_code(
                    ErrorCode::CONFIG_PARSE_ERROR,
                    format!("Invalid DATAGROWTH_HTTP_TIMEOUT '{}'", timeout),
                )
                .with_source(e)
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.tasks.concurrency == 0 {
            return Err(Error::config_with_code(
                ErrorCode::CONFIG_PARSE_ERROR,
                "tasks.concurrency must be at least 1",
            ));
        }
        Ok(())
    }
}
