//! Configuration loader and validator for the notes client.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub api: Api,
    #[serde(default)]
    pub sync: Polling,
    #[serde(default)]
    pub connectivity: Connectivity,
}

/// Remote notes API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Api {
    pub base_url: String,
}

/// Background refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Polling {
    pub heartbeat_secs: u64,
    #[serde(default)]
    pub reconcile: ReconcileMode,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileMode {
    #[default]
    Await,
    Spawn,
}

/// Reachability probe used to detect online/offline transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Connectivity {
    pub probe_interval_ms: u64,
    pub probe_timeout_ms: u64,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            heartbeat_secs: 30,
            reconcile: ReconcileMode::Await,
        }
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self {
            probe_interval_ms: 5000,
            probe_timeout_ms: 2000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: Api {
                base_url: "http://localhost:8000".into(),
            },
            sync: Polling::default(),
            connectivity: Connectivity::default(),
        }
    }
}

impl Config {
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        parse_base_url(&self.api.base_url)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.sync.heartbeat_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.connectivity.probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.connectivity.probe_timeout_ms)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.api.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("api.base_url must be non-empty"));
    }
    parse_base_url(&cfg.api.base_url)?;

    if cfg.sync.heartbeat_secs == 0 {
        return Err(ConfigError::Invalid("sync.heartbeat_secs must be > 0"));
    }

    if cfg.connectivity.probe_interval_ms == 0 {
        return Err(ConfigError::Invalid(
            "connectivity.probe_interval_ms must be > 0",
        ));
    }
    if cfg.connectivity.probe_timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "connectivity.probe_timeout_ms must be > 0",
        ));
    }

    Ok(())
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|_| ConfigError::Invalid("api.base_url must be an absolute URL"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ConfigError::Invalid("api.base_url must use http or https")),
    }
}

/// Sample configuration, identical to `Config::default()`.
pub fn example() -> &'static str {
    r#"api:
  base_url: "http://localhost:8000"

sync:
  heartbeat_secs: 30
  reconcile: await

connectivity:
  probe_interval_ms: 5000
  probe_timeout_ms: 2000
"#
}
