use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Where the scheduling backend lives and how long we wait for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Root of the REST API, e.g. `http://127.0.0.1:4343`.
    /// `FS42_API_URL` in the environment takes precedence.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Whole-request timeout. Requests are never retried.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// What a failed backend call does to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Log the failure and hand back the operation's fallback value.
    Swallow,
    /// Return the error to the caller.
    Propagate,
}

/// Error policy per operation category.
///
/// `listing` covers every read (channel list, schedule, bumps, baseline,
/// runtime files). `edits` covers every call that changes backend state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_listing_policy")]
    pub listing: ErrorPolicy,
    #[serde(default = "default_edits_policy")]
    pub edits: ErrorPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory for `fs42ctl.log`. Defaults to the platform data dir.
    #[serde(default = "platform::data_dir")]
    pub log_dir: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            listing: default_listing_policy(),
            edits: default_edits_policy(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_dir: platform::data_dir(),
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:4343".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_connect_timeout_secs() -> u64 {
    4
}

fn default_user_agent() -> String {
    format!("fs42-store/{}", env!("CARGO_PKG_VERSION"))
}

fn default_listing_policy() -> ErrorPolicy {
    ErrorPolicy::Swallow
}

fn default_edits_policy() -> ErrorPolicy {
    ErrorPolicy::Propagate
}

impl Config {
    /// Load `config.toml`, writing the defaults on first run, then apply
    /// environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        let mut config = if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            config
        } else {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml_str(&content)?
        };

        config.apply_env();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env(&mut self) {
        if let Some(url) = platform::api_url_override() {
            self.backend.base_url = url;
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            policy: PolicyConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}
