//! Process configuration read from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use salesagent_inventory::{IncrementalFallback, SyncPolicy};
use salesagent_observability::LogFormat;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_LOG_FORMAT: &str = "SALESAGENT_LOG_FORMAT";
pub const ENV_SYNC_INTERVAL_SECS: &str = "SALESAGENT_SYNC_INTERVAL_SECS";
pub const ENV_SYNC_TIMEOUT_SECS: &str = "SALESAGENT_SYNC_TIMEOUT_SECS";
pub const ENV_INCREMENTAL_FALLBACK: &str = "SALESAGENT_INCREMENTAL_FALLBACK";
pub const ENV_TENANTS_FILE: &str = "SALESAGENT_TENANTS_FILE";

const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(3600);
const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(1800);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Time between scheduler ticks.
    pub interval: Duration,
    /// Discovery-phase limit per run; `None` disables it (env value `0`).
    pub timeout: Option<Duration>,
    pub incremental_fallback: IncrementalFallback,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNC_INTERVAL,
            timeout: Some(DEFAULT_SYNC_TIMEOUT),
            incremental_fallback: IncrementalFallback::default(),
        }
    }
}

impl SyncConfig {
    pub fn policy(&self) -> SyncPolicy {
        SyncPolicy {
            incremental_fallback: self.incremental_fallback,
            timeout: self.timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppConfig {
    /// Postgres URL. Without it the in-memory stores are used.
    pub database_url: Option<String>,
    /// JSON array of tenant configurations loaded at startup.
    pub tenants_file: Option<PathBuf>,
    pub log_format: LogFormat,
    pub sync: SyncConfig,
    /// Problems found while reading; see [`AppConfig::log_warnings`].
    pub warnings: Vec<ConfigWarning>,
}

/// A setting that was present but unusable and replaced by its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: &'static str,
    pub value: String,
    pub message: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Invalid values are replaced by their
    /// defaults and kept in `warnings`; nothing is logged here.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = SyncConfig::default();
        let mut warnings = Vec::new();
        let mut invalid = |key: &'static str, value: &str, message: String| {
            warnings.push(ConfigWarning {
                key,
                value: value.to_string(),
                message,
            });
        };
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let log_format = match value(ENV_LOG_FORMAT) {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                invalid(ENV_LOG_FORMAT, &raw, format!("{e}; using json"));
                LogFormat::Json
            }),
            None => LogFormat::Json,
        };

        let interval = match value(ENV_SYNC_INTERVAL_SECS) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    invalid(ENV_SYNC_INTERVAL_SECS, &raw, "expected a positive number of seconds; using default".to_string());
                    defaults.interval
                }
            },
            None => defaults.interval,
        };

        let timeout = match value(ENV_SYNC_TIMEOUT_SECS) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => {
                    invalid(ENV_SYNC_TIMEOUT_SECS, &raw, "expected a number of seconds; using default".to_string());
                    defaults.timeout
                }
            },
            None => defaults.timeout,
        };

        let incremental_fallback = match value(ENV_INCREMENTAL_FALLBACK) {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                invalid(ENV_INCREMENTAL_FALLBACK, &raw, format!("{e}; using run_full"));
                IncrementalFallback::RunFull
            }),
            None => defaults.incremental_fallback,
        };

        Self {
            database_url: value(ENV_DATABASE_URL),
            tenants_file: value(ENV_TENANTS_FILE).map(PathBuf::from),
            log_format,
            sync: SyncConfig {
                interval,
                timeout,
                incremental_fallback,
            },
            warnings,
        }
    }

    /// Emit the collected warnings. Call once logging is initialized.
    pub fn log_warnings(&self) {
        for w in &self.warnings {
            warn!(key = w.key, value = %w.value, "invalid configuration value: {}", w.message);
        }
    }
}
