//! Service configuration
//!
//! Wraps the TOML configuration and resolves credentials with
//! environment → TOML priority. `validate` runs once at startup so a
//! misconfigured service fails before it accepts requests.

use cadence_common::config::TomlConfig;
use cadence_common::{Error, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::services::SchedulingPolicy;

pub const OPENAI_API_KEY_ENV: &str = "CADENCE_OPENAI_API_KEY";
pub const DATAFORSEO_LOGIN_ENV: &str = "CADENCE_DATAFORSEO_LOGIN";
pub const DATAFORSEO_PASSWORD_ENV: &str = "CADENCE_DATAFORSEO_PASSWORD";

/// Resolved configuration for one service process
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub toml: TomlConfig,
    pub openai_api_key: Option<String>,
    pub dataforseo_login: Option<String>,
    pub dataforseo_password: Option<String>,
}

impl ServiceConfig {
    /// Merge environment credentials over the TOML ones
    pub fn resolve(toml: TomlConfig) -> Self {
        let openai_api_key =
            resolve_credential("OpenAI API key", OPENAI_API_KEY_ENV, toml.openai.api_key.as_deref());
        let dataforseo_login = resolve_credential(
            "DataForSEO login",
            DATAFORSEO_LOGIN_ENV,
            toml.dataforseo.login.as_deref(),
        );
        let dataforseo_password = resolve_credential(
            "DataForSEO password",
            DATAFORSEO_PASSWORD_ENV,
            toml.dataforseo.password.as_deref(),
        );

        Self {
            toml,
            openai_api_key,
            dataforseo_login,
            dataforseo_password,
        }
    }

    /// Fail fast on missing credentials or unusable settings
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.openai_api_key.is_none() {
            missing.push(format!("{} or [openai] api_key", OPENAI_API_KEY_ENV));
        }
        if self.dataforseo_login.is_none() {
            missing.push(format!("{} or [dataforseo] login", DATAFORSEO_LOGIN_ENV));
        }
        if self.dataforseo_password.is_none() {
            missing.push(format!("{} or [dataforseo] password", DATAFORSEO_PASSWORD_ENV));
        }
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Missing credentials: {}",
                missing.join(", ")
            )));
        }

        let scheduling = &self.toml.scheduling;
        if scheduling.window_days == 0 {
            return Err(Error::Config("[scheduling] window_days must be at least 1".to_string()));
        }
        if scheduling.min_batch > scheduling.window_days {
            return Err(Error::Config(format!(
                "[scheduling] min_batch ({}) exceeds window_days ({})",
                scheduling.min_batch, scheduling.window_days
            )));
        }

        for (section, secs) in [
            ("openai", self.toml.openai.timeout_secs),
            ("dataforseo", self.toml.dataforseo.timeout_secs),
            ("page_fetch", self.toml.page_fetch.timeout_secs),
        ] {
            if secs == 0 {
                return Err(Error::Config(format!("[{}] timeout_secs must be positive", section)));
            }
        }

        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.toml.database_path()
    }

    pub fn bind_address(&self) -> String {
        self.toml.bind_address()
    }

    pub fn scheduling_policy(&self) -> SchedulingPolicy {
        SchedulingPolicy::from(&self.toml.scheduling)
    }

    pub fn max_lock_wait_ms(&self) -> u64 {
        self.toml.database.max_lock_wait_ms
    }
}

/// Environment first, then TOML. Blank values count as unset.
fn resolve_credential(label: &str, env_var: &str, toml_value: Option<&str>) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| is_valid_key(v));
    let toml_value = toml_value.filter(|v| is_valid_key(v)).map(str::to_string);

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in both environment ({}) and TOML config. Using environment.",
            label, env_var
        );
    }

    if env_value.is_some() {
        info!("{} loaded from environment variable", label);
        env_value
    } else if toml_value.is_some() {
        info!("{} loaded from TOML config", label);
        toml_value
    } else {
        None
    }
}

/// Non-empty, non-whitespace
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
