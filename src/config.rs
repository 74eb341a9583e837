use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::DEFAULT_TTL_MINUTES;
use crate::jira::types::MalformedTimestampPolicy;
use crate::metrics::EmissionPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub jira: JiraConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub search: SearchConfig,
  #[serde(default)]
  pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
  /// Auto-detect based on URL: .atlassian.net = cloud, else on-premise
  #[default]
  Auto,
  /// Jira Cloud - uses Basic auth (email + API token as password)
  Cloud,
  /// Jira On-premise - uses Bearer auth (PAT)
  Onpremise,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraConfig {
  pub url: String,
  pub email: String,
  /// Authentication type: auto, cloud, or onpremise
  #[serde(default)]
  pub auth_type: AuthType,
}

impl JiraConfig {
  /// Resolve `Auto` from the host name.
  pub fn effective_auth_type(&self) -> AuthType {
    match self.auth_type {
      AuthType::Auto => {
        let host = url::Url::parse(&self.url)
          .ok()
          .and_then(|u| u.host_str().map(str::to_lowercase))
          .unwrap_or_default();
        if host.ends_with(".atlassian.net") {
          AuthType::Cloud
        } else {
          AuthType::Onpremise
        }
      }
      other => other,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,
  #[serde(default = "default_ttl_minutes")]
  pub ttl_minutes: i64,
  /// Database location (defaults to the data directory)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      ttl_minutes: DEFAULT_TTL_MINUTES,
      path: None,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchConfig {
  /// Page requests in flight at once; unset means no limit
  pub max_concurrent_pages: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  #[serde(default)]
  pub malformed_timestamps: MalformedTimestampPolicy,
  #[serde(default)]
  pub emission: EmissionPolicy,
  #[serde(default = "default_percentile")]
  pub default_percentile: f64,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      malformed_timestamps: MalformedTimestampPolicy::default(),
      emission: EmissionPolicy::default(),
      default_percentile: default_percentile(),
    }
  }
}

fn default_true() -> bool {
  true
}

fn default_ttl_minutes() -> i64 {
  DEFAULT_TTL_MINUTES
}

fn default_percentile() -> f64 {
  85.0
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./jflow.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/jflow/config.yaml
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

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/jflow/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("jflow.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("jflow").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Get the Jira API token from environment variables.
  ///
  /// Checks JFLOW_JIRA_TOKEN first, then JIRA_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("JFLOW_JIRA_TOKEN")
      .or_else(|_| std::env::var("JIRA_API_TOKEN"))
      .map_err(|_| {
        eyre!("Jira API token not found. Set JFLOW_JIRA_TOKEN or JIRA_API_TOKEN environment variable.")
      })
  }
}
