use crate::constants::DEFAULT_BASE_URL;
use crate::error::{IngestError, Result};
use crate::pipeline::ingestion::{BreakerSettings, RetryPolicy};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Runtime settings. Every field has a default, so an empty or absent
/// `config.toml` is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache_folder: String,
    pub cache_max_days: u64,
    pub breaker_fail_max: u32,
    pub breaker_reset_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub base_url: String,
    pub log_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_folder: "resources/cache".to_string(),
            cache_max_days: 30,
            breaker_fail_max: 3,
            breaker_reset_timeout_secs: 10,
            http_timeout_secs: 10,
            retry_attempts: 3,
            retry_backoff_ms: 2000,
            base_url: DEFAULT_BASE_URL.to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

impl Settings {
    /// Defaults, then `config.toml` when present, then `.env` and the process
    /// environment.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH))
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut settings = if config_path.exists() {
            let content = fs::read_to_string(config_path).map_err(|e| {
                IngestError::Config(format!(
                    "Failed to read config file '{}': {}",
                    config_path.display(),
                    e
                ))
            })?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };

        dotenv::dotenv().ok();
        settings.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| IngestError::Config(format!("Invalid config: {}", e)))
    }

    /// Apply overrides from `lookup` (the environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CACHE_FOLDER") {
            self.cache_folder = v;
        }
        if let Some(v) = lookup("VITIBRASIL_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("LOG_DIR") {
            self.log_dir = v;
        }
        override_parsed(&lookup, "CACHE_MAX_DAYS", &mut self.cache_max_days)?;
        override_parsed(&lookup, "BREAKER_FAIL_MAX", &mut self.breaker_fail_max)?;
        override_parsed(&lookup, "BREAKER_RESET_TIMEOUT", &mut self.breaker_reset_timeout_secs)?;
        override_parsed(&lookup, "HTTP_TIMEOUT_SECS", &mut self.http_timeout_secs)?;
        override_parsed(&lookup, "RETRY_ATTEMPTS", &mut self.retry_attempts)?;
        override_parsed(&lookup, "RETRY_BACKOFF_MS", &mut self.retry_backoff_ms)?;
        Ok(())
    }

    pub fn breaker_settings(&self) -> BreakerSettings {
        BreakerSettings {
            fail_max: self.breaker_fail_max.max(1),
            reset_timeout: Duration::from_secs(self.breaker_reset_timeout_secs),
            probe_timeout: self.http_timeout(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts.max(1),
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn override_parsed<F, T>(lookup: &F, name: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(name) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| IngestError::Config(format!("{} must be a number, got '{}'", name, raw)))?;
    }
    Ok(())
}
