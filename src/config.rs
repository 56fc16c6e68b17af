use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStorage, MemoryStorage, NoopStorage, SqliteStorage};
use crate::error::{Result, TrackerError};
use crate::tracker::{Expiry, IssuesSettings};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Keep raw remote payloads on returned records
  #[serde(default)]
  pub verbose: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the API, e.g. https://tracker.example.com/api/v1/
  pub url: String,
  /// Primary project for project-scoped requests
  pub project: Option<String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  /// SQLite database on disk, shared between runs
  #[default]
  Sqlite,
  /// Process-local, dropped on exit
  Memory,
  /// No caching at all
  None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default)]
  pub backend: CacheBackend,
  /// SQLite database path (default: <cache dir>/trackr/cache.db)
  pub path: Option<PathBuf>,
  #[serde(default = "default_namespace")]
  pub namespace: String,
  #[serde(default = "default_issue_expiry_secs")]
  pub issue_expiry_secs: Option<u64>,
  #[serde(default = "default_fetch_expiry_secs")]
  pub fetch_expiry_secs: Option<u64>,
  /// null keeps linkages until the cache is cleared
  #[serde(default)]
  pub linkage_expiry_secs: Option<u64>,
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_namespace() -> String {
  "trackr".to_string()
}

fn default_issue_expiry_secs() -> Option<u64> {
  Some(60 * 60)
}

fn default_fetch_expiry_secs() -> Option<u64> {
  Some(5 * 60)
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      backend: CacheBackend::default(),
      path: None,
      namespace: default_namespace(),
      issue_expiry_secs: default_issue_expiry_secs(),
      fetch_expiry_secs: default_fetch_expiry_secs(),
      linkage_expiry_secs: None,
    }
  }
}

impl CacheConfig {
  pub fn expiry(&self) -> Expiry {
    Expiry {
      issue: self.issue_expiry_secs.map(Duration::from_secs),
      linkage: self.linkage_expiry_secs.map(Duration::from_secs),
      fetch: self.fetch_expiry_secs.map(Duration::from_secs),
    }
  }

  /// Open the configured storage backend.
  pub fn open_storage(&self) -> Result<Arc<dyn CacheStorage>> {
    let storage: Arc<dyn CacheStorage> = match self.backend {
      CacheBackend::Sqlite => match &self.path {
        Some(path) => Arc::new(SqliteStorage::open(path)?),
        None => Arc::new(SqliteStorage::open_default()?),
      },
      CacheBackend::Memory => Arc::new(MemoryStorage::new()),
      CacheBackend::None => Arc::new(NoopStorage),
    };
    Ok(storage)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./trackr.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/trackr/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(TrackerError::Config(format!(
          "Config file not found: {}",
          p.display()
        )));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(TrackerError::Config(
        "No configuration file found. Create one at ~/.config/trackr/config.yaml".to_string(),
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("trackr.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("trackr").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
      TrackerError::Config(format!(
        "Failed to read config file {}: {}",
        path.display(),
        e
      ))
    })?;

    Self::parse(&contents).map_err(|e| match e {
      TrackerError::Config(msg) => {
        TrackerError::Config(format!("{} ({})", msg, path.display()))
      }
      other => other,
    })
  }

  /// Parse configuration from YAML text.
  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)
      .map_err(|e| TrackerError::Config(format!("Failed to parse config: {}", e)))?;

    if config.cache.namespace.is_empty() {
      return Err(TrackerError::Config(
        "cache.namespace must not be empty".to_string(),
      ));
    }

    Ok(config)
  }

  pub fn issues_settings(&self) -> IssuesSettings {
    IssuesSettings {
      verbose: self.verbose,
      expiry: self.cache.expiry(),
    }
  }
}
