use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::DEFAULT_TTL_SECS;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL, e.g. https://api.mailersend.com/v1
  pub endpoint: Option<String>,
  /// Request timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      endpoint: None,
      timeout_secs: default_timeout_secs(),
    }
  }
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  /// Persist cached lists in a SQLite file between runs
  #[default]
  Sqlite,
  /// Keep cached lists for the lifetime of the process only
  Memory,
  /// Disable caching
  None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default)]
  pub backend: CacheBackend,
  #[serde(default = "default_ttl_secs")]
  pub ttl_secs: i64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      backend: CacheBackend::default(),
      ttl_secs: default_ttl_secs(),
    }
  }
}

fn default_ttl_secs() -> i64 {
  DEFAULT_TTL_SECS
}

impl Config {
  /// Load configuration from file, then apply environment overrides.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./mailctl.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/mailctl/config.yaml
  ///
  /// Running without a config file is fine as long as the environment
  /// provides the endpoint.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    Ok(config.with_env_overrides())
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("mailctl.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("mailctl").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  fn with_env_overrides(mut self) -> Self {
    if let Ok(endpoint) = std::env::var("MAILCTL_API_ENDPOINT") {
      if !endpoint.trim().is_empty() {
        self.api.endpoint = Some(endpoint);
      }
    }
    self
  }

  /// Get the API key from environment variables.
  ///
  /// Checks MAILCTL_API_KEY first, then MAILERSEND_API_TOKEN as fallback.
  /// Returns None when neither is set; the client rejects that at construction.
  pub fn get_api_key() -> Option<String> {
    std::env::var("MAILCTL_API_KEY")
      .or_else(|_| std::env::var("MAILERSEND_API_TOKEN"))
      .ok()
      .filter(|key| !key.trim().is_empty())
  }
}
