/*!
 * Daemon Configuration
 * Defaults overlaid with CCD_* environment variables
 */

use crate::core::errors::ConfigError;
use crate::core::limits::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_DEBOUNCE_DELAY, DEFAULT_MAX_STALENESS,
    DEFAULT_SAMPLE_INTERVAL, RULES_FILE_NAME,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

pub const ENV_CONFIG_DIR: &str = "CCD_CONFIG_DIR";
pub const ENV_SAMPLE_INTERVAL_MS: &str = "CCD_SAMPLE_INTERVAL_MS";
pub const ENV_DEBOUNCE_MS: &str = "CCD_DEBOUNCE_MS";
pub const ENV_MAX_STALENESS_MS: &str = "CCD_MAX_STALENESS_MS";
pub const ENV_AUTO_APPLY: &str = "CCD_AUTO_APPLY";

/// Runtime settings for the affinity daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Directory holding config.toml and monitored_processes.json
    pub config_dir: PathBuf,
    pub sample_interval: Duration,
    pub debounce_delay: Duration,
    pub max_staleness: Duration,
    pub auto_apply: bool,
}

impl DaemonConfig {
    /// Defaults rooted at `config_dir`
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            debounce_delay: DEFAULT_DEBOUNCE_DELAY,
            max_staleness: DEFAULT_MAX_STALENESS,
            auto_apply: false,
        }
    }

    /// Defaults under the platform configuration directory
    pub fn platform_default() -> Result<Self, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::with_config_dir(base.join(CONFIG_DIR_NAME)))
    }

    /// Defaults overlaid with the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let env: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with("CCD_"))
            .collect();
        Self::from_env_map(&env)
    }

    /// Defaults overlaid with `env`
    pub fn from_env_map(env: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = match env.get(ENV_CONFIG_DIR).filter(|v| !v.is_empty()) {
            Some(dir) => Self::with_config_dir(dir),
            None => Self::platform_default()?,
        };

        if let Some(value) = env.get(ENV_SAMPLE_INTERVAL_MS) {
            config.sample_interval = parse_millis(value, ENV_SAMPLE_INTERVAL_MS)?;
        }
        if let Some(value) = env.get(ENV_DEBOUNCE_MS) {
            config.debounce_delay = parse_millis(value, ENV_DEBOUNCE_MS)?;
        }
        if let Some(value) = env.get(ENV_MAX_STALENESS_MS) {
            config.max_staleness = parse_millis(value, ENV_MAX_STALENESS_MS)?;
        }
        if let Some(value) = env.get(ENV_AUTO_APPLY) {
            config.auto_apply = parse_bool(value, ENV_AUTO_APPLY)?;
        }

        debug!(?config, "daemon configuration resolved");
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    pub fn rules_file(&self) -> PathBuf {
        self.config_dir.join(RULES_FILE_NAME)
    }
}

fn parse_millis(value: &str, var: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        var: var.into(),
        value: value.into(),
        reason: reason.into(),
    };
    let millis = value
        .trim()
        .parse::<u64>()
        .map_err(|_| invalid("expected milliseconds as an unsigned integer"))?;
    if millis == 0 {
        return Err(invalid("must be greater than zero"));
    }
    Ok(Duration::from_millis(millis))
}

fn parse_bool(value: &str, var: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var: var.into(),
            value: value.into(),
            reason: "expected boolean (true/false/1/0/yes/no/on/off)".into(),
        }),
    }
}
