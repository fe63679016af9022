//! YAML configuration file.
//!
//! Unknown keys are rejected so that a typo fails at startup instead of
//! silently falling back to a default. [`Config::validate`] checks the values
//! that would otherwise only fail on the first delivery, including compiling
//! the message template.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::github::GitHubAppConfig;
use crate::message;
use crate::pipeline::PipelineSettings;
use crate::release_manager::{ReleaseManagerConfig, RetrySchedule};
use crate::template::TemplateError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("invalid message template: {0}")]
    Template(#[from] TemplateError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub github: GitHubConfig,
    pub release_manager: ReleaseManagerSection,
    pub app_configuration: AppConfiguration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitHubConfig {
    pub app_id: u64,
    pub private_key: String,
    pub webhook_secret: String,
    #[serde(default = "default_github_timeout")]
    pub timeout_secs: u64,
}

#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReleaseManagerSection {
    pub url: String,
    pub auth_token: String,
    #[serde(default = "default_release_manager_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_delays")]
    pub retry_delays_secs: Vec<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfiguration {
    pub message_template: String,
    #[serde(default)]
    pub ignored_repositories: Vec<String>,
    /// Repository name to service name overrides.
    #[serde(default)]
    pub repository_services: HashMap<String, String>,
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_github_timeout() -> u64 {
    3
}

fn default_release_manager_timeout() -> u64 {
    10
}

fn default_retry_delays() -> Vec<u64> {
    RetrySchedule::DEFAULT_DELAYS
        .iter()
        .map(Duration::as_secs)
        .collect()
}

impl Config {
    /// Reads and parses the file at `path`. Does not validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    /// Rejects configurations that could not serve a single delivery.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.release_manager.url.trim().is_empty() {
            return Err(ConfigError::Invalid("release_manager.url is empty".into()));
        }
        match url::Url::parse(&self.release_manager.url) {
            Ok(url) if !url.cannot_be_a_base() => {}
            Ok(_) => {
                return Err(ConfigError::Invalid(format!(
                    "release_manager.url '{}' cannot carry a path",
                    self.release_manager.url
                )));
            }
            Err(e) => {
                return Err(ConfigError::Invalid(format!(
                    "release_manager.url '{}': {e}",
                    self.release_manager.url
                )));
            }
        }
        if self.github.webhook_secret.is_empty() {
            return Err(ConfigError::Invalid("github.webhook_secret is empty".into()));
        }
        if self.github.timeout_secs == 0 {
            return Err(ConfigError::Invalid("github.timeout_secs must be positive".into()));
        }
        if self.release_manager.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "release_manager.timeout_secs must be positive".into(),
            ));
        }
        message::validate(&self.app_configuration.message_template)?;
        Ok(())
    }

    /// The address the server binds to, `address:port`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.address, self.server.port)
    }

    pub fn release_manager_client(&self) -> ReleaseManagerConfig {
        ReleaseManagerConfig {
            base_url: self.release_manager.url.trim_end_matches('/').to_string(),
            auth_token: self.release_manager.auth_token.clone(),
            timeout: Duration::from_secs(self.release_manager.timeout_secs),
            retry: RetrySchedule::from_secs(&self.release_manager.retry_delays_secs),
        }
    }

    pub fn github_app(&self) -> GitHubAppConfig {
        GitHubAppConfig {
            app_id: self.github.app_id,
            private_key: self.github.private_key.clone(),
            timeout: Duration::from_secs(self.github.timeout_secs),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        let app = &self.app_configuration;
        PipelineSettings {
            message_template: app.message_template.clone(),
            ignored_repositories: app.ignored_repositories.iter().cloned().collect::<HashSet<_>>(),
            repository_services: app.repository_services.clone(),
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("app_id", &self.app_id)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for ReleaseManagerSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseManagerSection")
            .field("url", &self.url)
            .field("timeout_secs", &self.timeout_secs)
            .field("retry_delays_secs", &self.retry_delays_secs)
            .finish_non_exhaustive()
    }
}
