//! Layered configuration of the `learnlens` binary.
//!
//! Precedence (lowest first): built-in defaults, YAML file, environment
//! (`LEARNLENS__SECTION__KEY`), command-line overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use learnlens_auth::{ApiClientConfig, FileTokenStore};
use learnlens_http::TransportSecurity;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://backend-service-tau.vercel.app";
pub const DEFAULT_CONFIG_FILE: &str = "learnlens.yaml";
pub const ENV_PREFIX: &str = "LEARNLENS__";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Root URL of the dashboard API.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Permit plain `http://` base URLs (local mock servers only).
    pub allow_insecure_http: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout_secs: 30,
            allow_insecure_http: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Token file; defaults to the per-user data directory.
    pub token_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            format: LogFormat::Text,
        }
    }
}

/// Overrides taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    /// `-v` count: 1 info, 2 debug, 3+ trace.
    pub verbose: u8,
}

impl AppConfig {
    /// Load defaults, then `path` (or `learnlens.yaml` in the working
    /// directory if present), then `LEARNLENS__*` environment variables.
    ///
    /// # Errors
    ///
    /// Fails if an explicit `path` does not exist or any layer holds an
    /// invalid value.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        match path {
            Some(path) => {
                if !path.is_file() {
                    anyhow::bail!("config file does not exist: {}", path.display());
                }
                figment = figment.merge(Yaml::file(path));
            }
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    figment = figment.merge(Yaml::file(default));
                }
            }
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid configuration")
    }

    pub fn apply_cli_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(base_url) = &overrides.base_url {
            self.api.base_url.clone_from(base_url);
        }
        let level = match overrides.verbose {
            0 => return,
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        self.logging.level = level.to_owned();
    }

    /// Client configuration derived from the `api` section.
    ///
    /// # Errors
    ///
    /// Fails if `api.base_url` is not an absolute URL.
    pub fn api_client_config(&self) -> Result<ApiClientConfig> {
        let base_url = Url::parse(&self.api.base_url)
            .with_context(|| format!("invalid api.base_url: {}", self.api.base_url))?;

        let mut config = ApiClientConfig::new(base_url);
        config.request_timeout = Duration::from_secs(self.api.timeout_secs);
        if self.api.allow_insecure_http {
            config.transport = TransportSecurity::AllowInsecureHttp;
        }
        Ok(config)
    }

    /// Token file location: `storage.token_file` or the per-user default.
    ///
    /// # Errors
    ///
    /// Fails when neither is available.
    pub fn token_file(&self) -> Result<PathBuf> {
        self.storage
            .token_file
            .clone()
            .or_else(FileTokenStore::default_path)
            .context("cannot determine token file location; set storage.token_file")
    }

    /// Pretty JSON of the effective configuration.
    ///
    /// # Errors
    ///
    /// Fails only if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize configuration")
    }
}
