//! Configuration management for the account-broker daemon.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::api::ServerConfig;
use crate::cache::DEFAULT_REFRESH_SECS;
use crate::cli::Args;
use crate::store::DEFAULT_SERVICE;

/// File name of the persisted registry state.
pub const REGISTRY_FILE: &str = "registry.json";

/// File name of the persisted config cache.
pub const CONFIGS_FILE: &str = "configs.json";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub security: SecuritySection,
    pub storage: StorageSection,
    pub remote: RemoteSection,
    pub cache: CacheSection,
    pub logging: LoggingSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Finish in-flight requests on Ctrl+C.
    pub graceful_shutdown: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3900,
            graceful_shutdown: true,
        }
    }
}

/// Control API authentication.
///
/// Authentication is active when enabled and at least one key is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    pub enabled: bool,
    pub api_keys: Vec<String>,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            enabled: true,
            api_keys: Vec::new(),
        }
    }
}

impl SecuritySection {
    pub fn requires_auth(&self) -> bool {
        self.enabled && !self.api_keys.is_empty()
    }

    fn add_key(&mut self, key: &str) {
        if key.is_empty() {
            return;
        }
        self.enabled = true;
        if !self.api_keys.iter().any(|k| k == key) {
            self.api_keys.push(key.to_string());
        }
    }
}

/// Where state lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory for `registry.json` and `configs.json`. Defaults to the
    /// platform's local data directory.
    pub state_dir: Option<PathBuf>,
    /// Keep sessions in process memory instead of the OS keychain.
    pub memory_store: bool,
    /// Keychain service name sessions are stored under.
    pub keychain_service: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            state_dir: None,
            memory_store: false,
            keychain_service: DEFAULT_SERVICE.to_string(),
        }
    }
}

/// Auth/config server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    pub base_url: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: crate::client::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Config cache tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Age after which a region config is refetched.
    pub refresh_interval_secs: i64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_SECS,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or a full filter
    /// directive.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("ACCOUNT_BROKER_HOST") {
            self.server.host = host;
        }

        if let Some(port) = var("ACCOUNT_BROKER_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Some(key) = var("ACCOUNT_BROKER_API_KEY") {
            self.security.add_key(&key);
        }

        if let Some(dir) = var("ACCOUNT_BROKER_STATE_DIR") {
            if !dir.is_empty() {
                self.storage.state_dir = Some(PathBuf::from(dir));
            }
        }

        if let Some(url) = var("ACCOUNT_BROKER_REMOTE") {
            if !url.is_empty() {
                self.remote.base_url = Some(url);
            }
        }

        if let Some(level) = var("ACCOUNT_BROKER_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(ref key) = args.api_key {
            self.security.add_key(key);
        }

        if args.no_auth {
            self.security.enabled = false;
        }

        if let Some(ref dir) = args.state_dir {
            self.storage.state_dir = Some(dir.clone());
        }

        if args.memory_store {
            self.storage.memory_store = true;
        }

        if let Some(ref url) = args.remote {
            self.remote.base_url = Some(url.clone());
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// Convert to ServerConfig for the API server.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;

        let mut server_config = ServerConfig::new(host.to_string(), self.server.port);
        if !self.server.graceful_shutdown {
            server_config = server_config.without_graceful_shutdown();
        }
        Ok(server_config)
    }

    /// Base URL of the auth/config server.
    pub fn remote_url(&self) -> Result<&str, ConfigError> {
        match self.remote.base_url.as_deref() {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(url),
            Some(url) => Err(ConfigError::InvalidRemote(url.to_string())),
            None => Err(ConfigError::MissingRemote),
        }
    }

    /// Resolved state directory.
    pub fn state_dir(&self) -> PathBuf {
        self.storage.state_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|dir| dir.join("account-broker"))
                .unwrap_or_else(|| PathBuf::from(".account-broker"))
        })
    }

    pub fn registry_path(&self) -> PathBuf {
        self.state_dir().join(REGISTRY_FILE)
    }

    pub fn configs_path(&self) -> PathBuf {
        self.state_dir().join(CONFIGS_FILE)
    }

    pub fn refresh_interval(&self) -> Result<chrono::Duration, ConfigError> {
        if self.cache.refresh_interval_secs <= 0 {
            return Err(ConfigError::InvalidInterval(self.cache.refresh_interval_secs));
        }
        Ok(chrono::Duration::seconds(self.cache.refresh_interval_secs))
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid host address.
    InvalidHost(String),
    /// No auth/config server configured.
    MissingRemote,
    /// Remote URL is not http(s).
    InvalidRemote(String),
    /// Refresh interval is not positive.
    InvalidInterval(i64),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid host address: {}", host),
            Self::MissingRemote => write!(
                f,
                "no remote server configured; pass --remote or set ACCOUNT_BROKER_REMOTE"
            ),
            Self::InvalidRemote(url) => write!(f, "invalid remote URL: {}", url),
            Self::InvalidInterval(secs) => {
                write!(f, "cache refresh interval must be positive, got {}", secs)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
