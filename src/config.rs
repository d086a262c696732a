//! Layered configuration for swimlane.
//!
//! Values are resolved in order: built-in defaults, then `swimlane.toml`, then
//! environment variables (a `.env` file is loaded first by the binary), then
//! CLI flags applied by the command handlers.
//!
//! # Configuration File Format
//!
//! ```toml
//! log_format = "json"
//!
//! [server]
//! port = 5001
//! dev_mode = false
//! seed_defaults = true
//!
//! [store]
//! backend = "http"
//! url = "https://db.example.com/query"
//! api_key = "..."
//! api_key_header = "X-Api-Key"
//! timeout_secs = 30
//! ```
//!
//! # Environment
//!
//! | Variable              | Overrides             |
//! |-----------------------|-----------------------|
//! | `PORT`                | `server.port`         |
//! | `SWIMLANE_STORE`      | `store.backend`       |
//! | `SQL_PROXY_URL`       | `store.url`           |
//! | `SQL_PROXY_API_KEY`   | `store.api_key`       |
//! | `SWIMLANE_DB_PATH`    | `store.db_path`       |
//! | `SWIMLANE_LOG_FORMAT` | `log_format`          |

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::board::proxy::{DEFAULT_API_KEY_HEADER, HttpSqlProxy, SqlProxy, SqliteProxy};
use crate::board::server::ServerConfig;

pub const CONFIG_FILE: &str = "swimlane.toml";

/// Where board data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Embedded SQLite file
    #[default]
    Sqlite,
    /// Remote SQL service over HTTP
    Http,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Sqlite => write!(f, "sqlite"),
            StoreBackend::Http => write!(f, "http"),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "http" => Ok(StoreBackend::Http),
            _ => bail!("Invalid store backend '{}'. Valid values: sqlite, http", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => bail!("Invalid log format '{}'. Valid values: text, json", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissive CORS and bind on all interfaces
    #[serde(default)]
    pub dev_mode: bool,
    /// Create the default board at startup when the store is empty
    #[serde(default = "default_seed_defaults")]
    pub seed_defaults: bool,
}

fn default_port() -> u16 {
    5001
}

fn default_seed_defaults() -> bool {
    true
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            dev_mode: false,
            seed_defaults: default_seed_defaults(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default)]
    pub backend: StoreBackend,
    /// SQLite database file (sqlite backend)
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Query endpoint of the SQL service (http backend)
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".swimlane/board.db")
}

fn default_api_key_header() -> String {
    DEFAULT_API_KEY_HEADER.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            db_path: default_db_path(),
            url: None,
            api_key: None,
            api_key_header: default_api_key_header(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse swimlane.toml")
    }

    /// Load an explicitly named file, or `swimlane.toml` in `dir` if present,
    /// or the defaults.
    pub fn load_or_default(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// File → environment. Store settings are checked by `build_proxy`.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::load_or_default(explicit, Path::new("."))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        debug!(backend = %config.store.backend, port = config.server.port, "Resolved configuration");
        Ok(config)
    }

    /// Overlay environment values read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT '{}'", port))?;
        }
        if let Some(backend) = lookup("SWIMLANE_STORE") {
            self.store.backend = backend.parse()?;
        }
        if let Some(url) = lookup("SQL_PROXY_URL") {
            self.store.url = Some(url);
        }
        if let Some(key) = lookup("SQL_PROXY_API_KEY") {
            self.store.api_key = Some(key);
        }
        if let Some(path) = lookup("SWIMLANE_DB_PATH") {
            self.store.db_path = PathBuf::from(path);
        }
        if let Some(format) = lookup("SWIMLANE_LOG_FORMAT") {
            self.log_format = format.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.store.backend == StoreBackend::Http
            && self.store.url.as_deref().is_none_or(|u| u.trim().is_empty())
        {
            bail!("The http store backend requires store.url (or SQL_PROXY_URL)");
        }
        if self.store.timeout_secs == 0 {
            bail!("store.timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.store.timeout_secs)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.server.port,
            dev_mode: self.server.dev_mode,
            seed_defaults: self.server.seed_defaults,
        }
    }

    /// Validate and open the configured store.
    pub fn build_proxy(&self) -> Result<Arc<dyn SqlProxy>> {
        self.validate()?;
        match self.store.backend {
            StoreBackend::Sqlite => {
                let path = &self.store.db_path;
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    std::fs::create_dir_all(parent).context("Failed to create database directory")?;
                }
                let proxy = SqliteProxy::open(path)
                    .with_context(|| format!("Failed to open database {}", path.display()))?;
                Ok(Arc::new(proxy))
            }
            StoreBackend::Http => {
                let url = self
                    .store
                    .url
                    .clone()
                    .context("The http store backend requires store.url")?;
                let proxy = HttpSqlProxy::new(
                    url,
                    self.store.api_key.clone(),
                    self.store.api_key_header.clone(),
                    self.timeout(),
                )
                .context("Failed to build SQL proxy client")?;
                Ok(Arc::new(proxy))
            }
        }
    }
}
