use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::poll::PollConfig;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub poll: PollSettings,
    #[serde(default)]
    pub history: HistorySettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_poll_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistorySettings {
    #[serde(default = "default_history_limit")]
    pub limit: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            limit: default_history_limit(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_poll_timeout_ms() -> u64 {
    120_000
}

fn default_history_limit() -> u32 {
    10
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            // Try default paths
            builder = builder.add_source(config::File::with_name("lookout").required(false));
        }

        // Environment variable overrides with LOOKOUT_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("LOOKOUT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let config: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.is_empty() {
            return Err(AppError::Config("api.base_url must not be empty".to_string()));
        }
        if self.poll.interval_ms == 0 {
            return Err(AppError::Config("poll.interval_ms must be positive".to_string()));
        }
        if self.poll.timeout_ms == 0 {
            return Err(AppError::Config("poll.timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn poll_config(&self) -> Result<PollConfig> {
        PollConfig::new(
            Duration::from_millis(self.poll.interval_ms),
            Duration::from_millis(self.poll.timeout_ms),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.api.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults_cover_every_section() {
        let config = AppConfig::default();
        assert_eq!(config.api.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.poll.interval_ms, 1_000);
        assert_eq!(config.poll.timeout_ms, 120_000);
        assert_eq!(config.history.limit, 10);
        config.validate().unwrap();
        config.poll_config().unwrap();
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let config = AppConfig {
            poll: PollSettings {
                interval_ms: 0,
                timeout_ms: 1_000,
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
        assert!(config.poll_config().is_err());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let config = AppConfig {
            poll: PollSettings {
                interval_ms: 1_000,
                timeout_ms: 0,
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
        assert!(config.poll_config().is_err());
    }

    #[test]
    fn test_file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lookout.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[api]\nbase_url = \"http://review.internal:9000\"\n\n[poll]\ninterval_ms = 250\ntimeout_ms = 9000\n\n[history]\nlimit = 3"
        )
        .unwrap();

        let config = AppConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.api.base_url, "http://review.internal:9000");
        assert_eq!(config.poll.interval_ms, 250);
        assert_eq!(config.poll.timeout_ms, 9000);
        assert_eq!(config.history.limit, 3);
    }

    #[test]
    fn test_zero_interval_in_file_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lookout.toml");
        std::fs::write(&path, "[poll]\ninterval_ms = 0\n").unwrap();

        let result = AppConfig::load(Some(path.to_str().unwrap()));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_env_overrides_file_and_defaults() {
        // This test owns the request_timeout_ms key; no other test reads it
        // through load(), so parallel runs don't interfere.
        std::env::set_var("LOOKOUT__API__REQUEST_TIMEOUT_MS", "12345");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lookout.toml");
        std::fs::write(&path, "[api]\nrequest_timeout_ms = 1\n").unwrap();

        let config = AppConfig::load(Some(path.to_str().unwrap())).unwrap();
        std::env::remove_var("LOOKOUT__API__REQUEST_TIMEOUT_MS");

        assert_eq!(config.api.request_timeout_ms, 12345);
        assert_eq!(config.request_timeout(), Duration::from_millis(12345));
    }
}
