//! Configuration loaded from `questgen.toml`.
//!
//! Every field has a default, so an absent file or a partial one is fine.
//! `QUESTGEN_BROKER_URL`, `QUESTGEN_RESULT_BACKEND` and `QUESTGEN_WORKERS`
//! take precedence over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::ExecutionLimits;
use crate::impls::MEMORY_SCHEME;
use crate::policy::{Backoff, DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use crate::store::RetentionPolicy;

pub const ENV_BROKER_URL: &str = "QUESTGEN_BROKER_URL";
pub const ENV_RESULT_BACKEND: &str = "QUESTGEN_RESULT_BACKEND";
pub const ENV_WORKERS: &str = "QUESTGEN_WORKERS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    #[default]
    Immediate,
    Fixed,
    Exponential,
}

/// `[retry]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub backoff: BackoffKind,

    /// Delay for `fixed`, first delay for `exponential`.
    pub base_delay_ms: u64,

    pub multiplier: f64,

    /// Cap for `exponential`.
    pub max_delay_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffKind::Immediate,
            base_delay_ms: 60_000,
            multiplier: 2.0,
            max_delay_ms: None,
        }
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> Backoff {
        let base = Duration::from_millis(self.base_delay_ms);
        match self.backoff {
            BackoffKind::Immediate => Backoff::Immediate,
            BackoffKind::Fixed => Backoff::Fixed(base),
            BackoffKind::Exponential => Backoff::Exponential {
                base,
                multiplier: self.multiplier,
                max: self.max_delay_ms.map(Duration::from_millis),
            },
        }
    }
}

/// `[retention]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub max_age_secs: u64,
    pub max_entries: Option<usize>,
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 24 * 60 * 60,
            max_entries: None,
            sweep_interval_secs: 60,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestgenConfig {
    /// Broker endpoint. Only `memory://` is served.
    #[serde(default = "default_endpoint")]
    pub broker_url: String,

    /// Result-backend endpoint. Only `memory://` is served.
    #[serde(default = "default_endpoint")]
    pub result_backend: String,

    /// Attempts per job, first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Hard execution window per attempt.
    #[serde(default = "default_execution_timeout_secs")]
    pub execution_timeout_secs: u64,

    /// Soft limit; `0` disables it.
    #[serde(default = "default_soft_time_limit_secs")]
    pub soft_time_limit_secs: u64,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub retention: RetentionConfig,
}

fn default_endpoint() -> String {
    MEMORY_SCHEME.to_string()
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_execution_timeout_secs() -> u64 {
    300
}

fn default_soft_time_limit_secs() -> u64 {
    240
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for QuestgenConfig {
    fn default() -> Self {
        Self {
            broker_url: default_endpoint(),
            result_backend: default_endpoint(),
            max_attempts: default_max_attempts(),
            execution_timeout_secs: default_execution_timeout_secs(),
            soft_time_limit_secs: default_soft_time_limit_secs(),
            workers: default_workers(),
            retry: RetryConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl QuestgenConfig {
    /// Load `path` if it exists (defaults otherwise), apply the environment,
    /// then validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_toml(&contents)?
        } else {
            Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Override fields from the environment; `lookup` returns a variable's value.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup(ENV_BROKER_URL)
            && !url.is_empty()
        {
            self.broker_url = url;
        }
        if let Some(url) = lookup(ENV_RESULT_BACKEND)
            && !url.is_empty()
        {
            self.result_backend = url;
        }
        if let Some(raw) = lookup(ENV_WORKERS)
            && !raw.is_empty()
        {
            self.workers = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{ENV_WORKERS} must be a positive integer, got {raw:?}"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg)) };

        if self.max_attempts == 0 {
            return invalid("max_attempts must be at least 1".into());
        }
        if self.execution_timeout_secs == 0 {
            return invalid("execution_timeout_secs must be positive".into());
        }
        if self.soft_time_limit_secs >= self.execution_timeout_secs {
            return invalid(format!(
                "soft_time_limit_secs ({}) must be below execution_timeout_secs ({}); \
                 lower soft_time_limit_secs or set it to 0 to disable the soft limit",
                self.soft_time_limit_secs, self.execution_timeout_secs
            ));
        }
        if self.workers == 0 {
            return invalid("workers must be at least 1".into());
        }
        if self.retry.multiplier < 1.0 || !self.retry.multiplier.is_finite() {
            return invalid(format!(
                "retry.multiplier must be >= 1, got {}",
                self.retry.multiplier
            ));
        }
        if self.retention.sweep_interval_secs == 0 {
            return invalid("retention.sweep_interval_secs must be positive".into());
        }
        for (name, url) in [
            ("broker_url", &self.broker_url),
            ("result_backend", &self.result_backend),
        ] {
            if !url.starts_with(MEMORY_SCHEME) {
                return invalid(format!(
                    "{name} {url:?} is not supported (only {MEMORY_SCHEME})"
                ));
            }
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry.backoff())
    }

    pub fn execution_limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            timeout: Duration::from_secs(self.execution_timeout_secs),
            soft_limit: (self.soft_time_limit_secs > 0)
                .then(|| Duration::from_secs(self.soft_time_limit_secs)),
        }
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_age: Duration::from_secs(self.retention.max_age_secs),
            max_entries: self.retention.max_entries,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.retention.sweep_interval_secs)
    }
}
