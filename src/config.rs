use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Origin the precache manifest is resolved against
  #[serde(default = "default_origin")]
  pub origin: String,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      origin: default_origin(),
      cache: CacheConfig::default(),
      storage: StorageConfig::default(),
      logging: LoggingConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Cache generation identifier. Bump on every deploy that changes precached assets.
  #[serde(default = "default_version")]
  pub version: String,
  /// Document served for every navigation request
  #[serde(default = "default_entry_document")]
  pub entry_document: String,
  /// Ordered list of shell asset paths fetched on install
  #[serde(default = "default_precache")]
  pub precache: Vec<String>,
  /// Hostname fragments that are never cached (case-insensitive)
  #[serde(default = "default_bypass_hosts", deserialize_with = "deserialize_lowercase_vec")]
  pub bypass_hosts: Vec<String>,
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      version: default_version(),
      entry_document: default_entry_document(),
      precache: default_precache(),
      bypass_hosts: default_bypass_hosts(),
      request_timeout_secs: default_request_timeout_secs(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// SQLite database path (defaults to $XDG_DATA_HOME/diraasti/diraasti.db)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Write daily-rolling log files here instead of stderr
  pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      directory: None,
    }
  }
}

fn default_origin() -> String {
  "http://localhost:8080".to_string()
}

fn default_version() -> String {
  "diraasti-cache-v2".to_string()
}

fn default_entry_document() -> String {
  "/index.html".to_string()
}

fn default_precache() -> Vec<String> {
  [
    "/",
    "/index.html",
    "/src/main.js",
    "/src/App.js",
    "/manifest.webmanifest",
    "/assets/logo.svg",
    "/assets/icon-192.png",
    "/assets/icon-512.png",
    "/assets/favicon.png",
  ]
  .into_iter()
  .map(String::from)
  .collect()
}

fn default_bypass_hosts() -> Vec<String> {
  vec!["generative".to_string(), "googleapis".to_string()]
}

fn default_request_timeout_secs() -> u64 {
  30
}

fn default_log_level() -> String {
  "info".to_string()
}

fn deserialize_lowercase_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v: Vec<String> = Vec::deserialize(deserializer)?;
  Ok(v.into_iter().map(|s| s.to_lowercase()).collect())
}

impl Config {
  /// Load configuration from file, falling back to defaults.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./diraasti.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/diraasti/config.yaml
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
      None => Self::default(),
    };
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("diraasti.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("diraasti").join("config.yaml");
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

  fn from_yaml(contents: &str) -> Result<Self> {
    Ok(serde_yaml::from_str(contents)?)
  }

  fn validate(&self) -> Result<()> {
    self.origin_url()?;
    if self.cache.version.trim().is_empty() {
      return Err(eyre!("cache.version must not be empty"));
    }
    if !self.cache.entry_document.starts_with('/') {
      return Err(eyre!(
        "cache.entry_document must be an absolute path, got {:?}",
        self.cache.entry_document
      ));
    }
    Ok(())
  }

  /// Parsed origin URL.
  pub fn origin_url(&self) -> Result<Url> {
    Url::parse(&self.origin).map_err(|e| eyre!("Invalid origin {:?}: {}", self.origin, e))
  }

  /// Resolved database path.
  pub fn database_path(&self) -> Result<PathBuf> {
    match &self.storage.path {
      Some(p) => Ok(p.clone()),
      None => {
        let data_dir = dirs::data_dir()
          .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
          .ok_or_else(|| eyre!("Could not determine data directory"))?;
        Ok(data_dir.join("diraasti").join("diraasti.db"))
      }
    }
  }
}
