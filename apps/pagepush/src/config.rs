//! Command line configuration.
//!
//! Configuration is read from TOML. The file is the `--config` argument,
//! else `$PAGEPUSH_CONFIG`, else `./pagepush.toml`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use pagepush_deploy::{DeployOptions, RetryPolicy};
use pagepush_pages_client::ClientConfig;
use pagepush_pages_client::client::DEFAULT_BASE_URL;
use pagepush_protocol::constants::{BULK_UPLOAD_CONCURRENCY, DEPLOYMENT_TIMEOUT, RETRY_BASE_DELAY};
use serde::{Deserialize, Serialize};

pub const CONFIG_ENV: &str = "PAGEPUSH_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "pagepush.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pages: PagesConfig,
    #[serde(default)]
    pub deploy: DeploySection,
}

/// `[pages]`: API credentials and deployment target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagesConfig {
    #[serde(default)]
    pub api_token: String,

    /// Account to deploy to. Resolved from the token when unset.
    #[serde(default)]
    pub account_id: Option<String>,

    /// Case-insensitive filter on the account name, used when
    /// `account_id` is unset.
    #[serde(default)]
    pub account_name: Option<String>,

    /// Target project. Defaults to the newest project of the account.
    #[serde(default)]
    pub project_name: Option<String>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// `[deploy]`: upload and commit tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySection {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_deployment_timeout_secs")]
    pub deployment_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_concurrency() -> usize {
    BULK_UPLOAD_CONCURRENCY
}

fn default_retry_base_delay_ms() -> u64 {
    RETRY_BASE_DELAY.as_millis() as u64
}

fn default_deployment_timeout_secs() -> u64 {
    DEPLOYMENT_TIMEOUT.as_secs()
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            account_id: None,
            account_name: None,
            project_name: None,
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for DeploySection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            deployment_timeout_secs: default_deployment_timeout_secs(),
        }
    }
}

impl Config {
    /// Loads and validates the configuration file.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = config_path(explicit, std::env::var_os(CONFIG_ENV));
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading configuration from {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.pages.api_token.trim().is_empty() {
            bail!("pages.api_token is required");
        }
        if config.deploy.concurrency == 0 {
            bail!("deploy.concurrency must be at least 1");
        }
        Ok(config)
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut client = ClientConfig::new(self.pages.api_token.clone());
        client.base_url = self.pages.api_base_url.clone();
        client.request_timeout = Duration::from_secs(self.pages.request_timeout_secs);
        client
    }

    pub fn deploy_options(&self) -> DeployOptions {
        DeployOptions {
            concurrency: self.deploy.concurrency,
            retry: RetryPolicy {
                base_delay: Duration::from_millis(self.deploy.retry_base_delay_ms),
            },
            deployment_timeout: Duration::from_secs(self.deploy.deployment_timeout_secs),
            ..DeployOptions::default()
        }
    }
}

/// Picks the configuration file: explicit path, then environment, then the
/// working directory.
fn config_path(explicit: Option<&Path>, env: Option<OsString>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match env {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::parse("[pages]\napi_token = \"tok\"\n").unwrap();
        assert_eq!(config.pages.api_token, "tok");
        assert_eq!(config.pages.account_id, None);
        assert_eq!(config.pages.api_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.pages.request_timeout_secs, 300);
        assert_eq!(config.deploy.concurrency, 3);
        assert_eq!(config.deploy.retry_base_delay_ms, 1000);
        assert_eq!(config.deploy.deployment_timeout_secs, 120);
    }

    #[test]
    fn full_config() {
        let toml = r#"
            [pages]
            api_token = "tok"
            account_id = "acc"
            account_name = "music"
            project_name = "cdn"
            api_base_url = "http://localhost:8787"
            request_timeout_secs = 30

            [deploy]
            concurrency = 5
            retry_base_delay_ms = 250
            deployment_timeout_secs = 60
        "#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.pages.account_id.as_deref(), Some("acc"));
        assert_eq!(config.pages.project_name.as_deref(), Some("cdn"));

        let client = config.client_config();
        assert_eq!(client.base_url, "http://localhost:8787");
        assert_eq!(client.request_timeout, Duration::from_secs(30));

        let options = config.deploy_options();
        assert_eq!(options.concurrency, 5);
        assert_eq!(options.retry.base_delay, Duration::from_millis(250));
        assert_eq!(options.deployment_timeout, Duration::from_secs(60));
        assert_eq!(options.max_upload_retries, 5);
    }

    #[test]
    fn missing_token_is_rejected() {
        let err = Config::parse("[deploy]\nconcurrency = 2\n").unwrap_err();
        assert!(err.to_string().contains("api_token"));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        assert!(Config::parse("[pages]\napi_token = \"t\"\n[deploy]\nconcurrency = 0\n").is_err());
    }

    #[test]
    fn config_path_precedence() {
        let explicit = PathBuf::from("/etc/pagepush.toml");
        assert_eq!(
            config_path(Some(&explicit), Some("/env.toml".into())),
            explicit
        );
        assert_eq!(
            config_path(None, Some("/env.toml".into())),
            PathBuf::from("/env.toml")
        );
        assert_eq!(config_path(None, Some(OsString::new())), PathBuf::from(DEFAULT_CONFIG_FILE));
        assert_eq!(config_path(None, None), PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[pages]\napi_token = \"from-file\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.pages.api_token, "from-file");
    }

    #[test]
    fn load_missing_file_names_path() {
        let err = Config::load(Some(Path::new("/nonexistent/pagepush.toml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pagepush.toml"));
    }
}
