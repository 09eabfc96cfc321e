//! Queue configuration.

use std::time::Duration;

use thiserror::Error;

/// Env var prefix used by [`QueueConfig::from_env`].
pub const ENV_PREFIX: &str = "OUTPOST_";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("base_delay must be greater than zero")]
    ZeroBaseDelay,

    #[error("max_delay ({max:?}) must not be shorter than base_delay ({base:?})")]
    MaxBelowBase { base: Duration, max: Duration },

    #[error("storage_key must not be empty")]
    EmptyStorageKey,

    #[error("online_check_interval must be greater than zero")]
    ZeroCheckInterval,

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: String, value: String },
}

/// Queue configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Default retry ceiling for items that don't override it.
    pub max_retries: u32,

    /// Backoff base (delay before the first retry).
    pub base_delay: Duration,

    /// Backoff ceiling.
    pub max_delay: Duration,

    /// Persistence slot identifier.
    pub storage_key: String,

    /// Reconciliation poll period of the connectivity monitor.
    pub online_check_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            storage_key: "offline_request_queue".to_string(),
            online_check_interval: Duration::from_millis(30_000),
        }
    }
}

impl QueueConfig {
    /// Defaults, overridden by `OUTPOST_*` environment variables.
    ///
    /// - `OUTPOST_MAX_RETRIES`
    /// - `OUTPOST_BASE_DELAY_MS`
    /// - `OUTPOST_MAX_DELAY_MS`
    /// - `OUTPOST_STORAGE_KEY`
    /// - `OUTPOST_ONLINE_CHECK_MS`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "MAX_RETRIES")? {
            config.max_retries = u32::try_from(v).map_err(|_| ConfigError::InvalidEnv {
                var: format!("{ENV_PREFIX}MAX_RETRIES"),
                value: v.to_string(),
            })?;
        }
        if let Some(v) = parse_var(&lookup, "BASE_DELAY_MS")? {
            config.base_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse_var(&lookup, "MAX_DELAY_MS")? {
            config.max_delay = Duration::from_millis(v);
        }
        if let Some(key) = lookup(&format!("{ENV_PREFIX}STORAGE_KEY")) {
            config.storage_key = key;
        }
        if let Some(v) = parse_var(&lookup, "ONLINE_CHECK_MS")? {
            config.online_check_interval = Duration::from_millis(v);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_delay.is_zero() {
            return Err(ConfigError::ZeroBaseDelay);
        }
        if self.max_delay < self.base_delay {
            return Err(ConfigError::MaxBelowBase {
                base: self.base_delay,
                max: self.max_delay,
            });
        }
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::EmptyStorageKey);
        }
        if self.online_check_interval.is_zero() {
            return Err(ConfigError::ZeroCheckInterval);
        }
        Ok(())
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    pub fn with_storage_key(mut self, storage_key: impl Into<String>) -> Self {
        self.storage_key = storage_key.into();
        self
    }

    pub fn with_online_check_interval(mut self, interval: Duration) -> Self {
        self.online_check_interval = interval;
        self
    }
}

fn parse_var(
    lookup: &impl Fn(&str) -> Option<String>,
    suffix: &str,
) -> Result<Option<u64>, ConfigError> {
    let var = format!("{ENV_PREFIX}{suffix}");
    match lookup(&var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = QueueConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.storage_key, "offline_request_queue");
    }

    #[test]
    fn env_overrides_defaults() {
        let config = QueueConfig::from_lookup(lookup(&[
            ("OUTPOST_MAX_RETRIES", "7"),
            ("OUTPOST_BASE_DELAY_MS", "250"),
            ("OUTPOST_MAX_DELAY_MS", "4000"),
            ("OUTPOST_STORAGE_KEY", "skills_queue"),
            ("OUTPOST_ONLINE_CHECK_MS", "5000"),
        ]))
        .unwrap();

        assert_eq!(config.max_retries, 7);
        assert_eq!(config.base_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_millis(4000));
        assert_eq!(config.storage_key, "skills_queue");
        assert_eq!(config.online_check_interval, Duration::from_secs(5));
    }

    #[test]
    fn bad_env_value_is_reported() {
        let err = QueueConfig::from_lookup(lookup(&[("OUTPOST_BASE_DELAY_MS", "soon")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                var: "OUTPOST_BASE_DELAY_MS".to_string(),
                value: "soon".to_string()
            }
        );
    }

    #[test]
    fn validation_catches_inverted_backoff() {
        let config = QueueConfig::default()
            .with_backoff(Duration::from_secs(10), Duration::from_secs(1));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MaxBelowBase { .. })
        ));

        let config = QueueConfig::default().with_storage_key(" ");
        assert_eq!(config.validate(), Err(ConfigError::EmptyStorageKey));

        let config = QueueConfig::default().with_online_check_interval(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroCheckInterval));
    }
}
