//! Configuration loading
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. `CADENCE_CONFIG` environment variable
//! 3. Platform config file (`~/.config/cadence/config.toml` on Linux)
//! 4. Compiled defaults (fallback)
//!
//! A missing config file is not fatal: defaults are used and a warning is
//! logged. Credentials are validated later by the service, at startup.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CADENCE_CONFIG";

/// Default rolling window length in days
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Default minimum number of missing items before a top-up runs
pub const DEFAULT_MIN_BATCH: u32 = 7;

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub bind_address: Option<String>,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub openai: OpenAiConfig,
    pub dataforseo: DataForSeoConfig,
    pub page_fetch: PageFetchConfig,
    pub scheduling: SchedulingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; defaults to the platform data directory
    pub path: Option<PathBuf>,
    /// Total time to keep retrying a write that hits `database is locked`
    pub max_lock_wait_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_lock_wait_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "cadence_api=info,tower_http=info".to_string(),
        }
    }
}

/// Text generation (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

/// Keyword metrics enrichment (DataForSEO)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataForSeoConfig {
    pub login: Option<String>,
    pub password: Option<String>,
    pub base_url: String,
    pub location_code: u32,
    pub language_code: String,
    pub timeout_secs: u64,
}

impl Default for DataForSeoConfig {
    fn default() -> Self {
        Self {
            login: None,
            password: None,
            base_url: "https://api.dataforseo.com".to_string(),
            location_code: 2840,
            language_code: "en".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageFetchConfig {
    pub timeout_secs: u64,
    pub max_text_chars: usize,
    pub user_agent: String,
}

impl Default for PageFetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_text_chars: 8000,
            user_agent: "Mozilla/5.0 (compatible; SEO-Optimizer-Bot/1.0)".to_string(),
        }
    }
}

/// Content scheduling policy knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    pub window_days: u32,
    pub min_batch: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            min_batch: DEFAULT_MIN_BATCH,
        }
    }
}

impl TomlConfig {
    /// Resolve, read and parse the configuration.
    ///
    /// An explicit path that cannot be read is an error; a missing implicit
    /// file falls back to defaults.
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg) {
            Some(path) => {
                let config = read_toml_config(&path)?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            None => {
                warn!("No configuration file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }

    /// Database path, falling back to the platform default
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(default_database_path)
    }

    pub fn bind_address(&self) -> String {
        self.bind_address
            .clone()
            .unwrap_or_else(|| "127.0.0.1:5780".to_string())
    }
}

/// Locate the config file following the priority order above
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config file, only if present
    dirs::config_dir()
        .map(|d| d.join("cadence").join("config.toml"))
        .filter(|p| p.exists())
}

/// Read and parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cadence"))
        .unwrap_or_else(|| PathBuf::from("./cadence_data"))
        .join("cadence.db")
}
