// rust/worker-core/src/config.rs

//! Configuration management for the worker runtime.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, validation of configuration values, and merging of
//! the startup configuration received from the master.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, WorkerError};
use crate::master::StartupConfiguration;

/// Keys written into `[app]` when the startup configuration is merged.
pub mod keys {
    pub const INPUT_PATH: &str = "input.path";
    pub const INPUT_OFFSET: &str = "input.offset";
    pub const INPUT_LENGTH: &str = "input.length";
    pub const BATCH_SIZE: &str = "batch_size";
    pub const ITERATIONS: &str = "iterations";
}

// Top-level worker configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub master: MasterConfig,
    pub worker: TimingConfig,
    /// Free-form settings for the compute capability.
    pub app: BTreeMap<String, String>,
}

/// Connection settings for the master.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Master address as `host:port`.
    pub address: String,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

/// Scheduling of the heartbeat, wait protocol and shutdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Interval between heartbeats while running.
    pub heartbeat_interval_ms: u64,
    /// Sleep between `waiting` polls.
    pub wait_poll_interval_ms: u64,
    /// Delay before closing the connection when completion is not acknowledged.
    pub completion_grace_ms: u64,
    /// Optional ceiling on a single wait for a master update. Unbounded when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_wait_ms: Option<u64>,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:50051".to_string(),
            connect_timeout_ms: 5_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 2_000,
            wait_poll_interval_ms: 1_000,
            completion_grace_ms: 1_000,
            max_wait_ms: None,
        }
    }
}

impl MasterConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl TimingConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn wait_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wait_poll_interval_ms)
    }

    pub fn completion_grace(&self) -> Duration {
        Duration::from_millis(self.completion_grace_ms)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_ms.map(Duration::from_millis)
    }
}

impl FromStr for WorkerConfig {
    type Err = WorkerError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| WorkerError::config_with_source("failed to parse TOML config", e))
    }
}

impl WorkerConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            WorkerError::input_with_source(path, "failed to read config file", e)
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `IRW_`:
    // - `IRW_MASTER_ADDRESS` overrides `master.address`
    // - `IRW_WORKER_HEARTBEAT_INTERVAL_MS` overrides `worker.heartbeat_interval_ms`
    // - `IRW_WORKER_MAX_WAIT_MS` sets `worker.max_wait_ms`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Master overrides
        if let Ok(val) = std::env::var("IRW_MASTER_ADDRESS") {
            self.master.address = val;
        }
        if let Ok(val) = std::env::var("IRW_MASTER_CONNECT_TIMEOUT_MS") {
            if let Ok(v) = val.parse() {
                self.master.connect_timeout_ms = v;
            }
        }
        if let Ok(val) = std::env::var("IRW_MASTER_REQUEST_TIMEOUT_MS") {
            if let Ok(v) = val.parse() {
                self.master.request_timeout_ms = v;
            }
        }

        // Timing overrides
        if let Ok(val) = std::env::var("IRW_WORKER_HEARTBEAT_INTERVAL_MS") {
            if let Ok(v) = val.parse() {
                self.worker.heartbeat_interval_ms = v;
            }
        }
        if let Ok(val) = std::env::var("IRW_WORKER_WAIT_POLL_INTERVAL_MS") {
            if let Ok(v) = val.parse() {
                self.worker.wait_poll_interval_ms = v;
            }
        }
        if let Ok(val) = std::env::var("IRW_WORKER_COMPLETION_GRACE_MS") {
            if let Ok(v) = val.parse() {
                self.worker.completion_grace_ms = v;
            }
        }
        if let Ok(val) = std::env::var("IRW_WORKER_MAX_WAIT_MS") {
            if let Ok(v) = val.parse() {
                self.worker.max_wait_ms = Some(v);
            }
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.master.address.trim().is_empty() {
            return Err(WorkerError::config("master.address must not be empty"));
        }
        if self.master.connect_timeout_ms == 0 {
            return Err(WorkerError::config(
                "master.connect_timeout_ms must be greater than 0",
            ));
        }
        if self.master.request_timeout_ms == 0 {
            return Err(WorkerError::config(
                "master.request_timeout_ms must be greater than 0",
            ));
        }

        if self.worker.heartbeat_interval_ms == 0 {
            return Err(WorkerError::config(
                "worker.heartbeat_interval_ms must be greater than 0",
            ));
        }
        if self.worker.wait_poll_interval_ms == 0 {
            return Err(WorkerError::config(
                "worker.wait_poll_interval_ms must be greater than 0",
            ));
        }
        if let Some(max_wait) = self.worker.max_wait_ms {
            if max_wait < self.worker.wait_poll_interval_ms {
                return Err(WorkerError::config(
                    "worker.max_wait_ms must be at least worker.wait_poll_interval_ms",
                ));
            }
        }

        Ok(())
    }

    /// Merge the master's startup configuration into `[app]`.
    ///
    /// Master-supplied values replace local ones with the same key.
    pub fn merge_startup(&mut self, startup: &StartupConfiguration) {
        for (key, value) in &startup.properties {
            self.app.insert(key.clone(), value.clone());
        }

        let split = &startup.split;
        self.app.insert(
            keys::INPUT_PATH.to_string(),
            split.path.to_string_lossy().into_owned(),
        );
        self.app
            .insert(keys::INPUT_OFFSET.to_string(), split.offset.to_string());
        self.app
            .insert(keys::INPUT_LENGTH.to_string(), split.length.to_string());
        self.app
            .insert(keys::BATCH_SIZE.to_string(), startup.batch_size.to_string());
        self.app
            .insert(keys::ITERATIONS.to_string(), startup.iterations.to_string());
    }

    /// Raw `[app]` setting.
    pub fn app_setting(&self, key: &str) -> Option<&str> {
        self.app.get(key).map(String::as_str)
    }

    /// Parsed `[app]` setting; `Ok(None)` when the key is absent.
    pub fn app_setting_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.app.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|e| {
                WorkerError::config(format!("app.{key} has invalid value '{raw}': {e}"))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::FileSplit;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();

        assert_eq!(config.master.address, "127.0.0.1:50051");
        assert_eq!(config.master.connect_timeout_ms, 5_000);
        assert_eq!(config.master.request_timeout_ms, 30_000);

        assert_eq!(config.worker.heartbeat_interval(), Duration::from_millis(2000));
        assert_eq!(config.worker.wait_poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.worker.completion_grace(), Duration::from_millis(1000));
        assert!(config.worker.max_wait().is_none());

        assert!(config.app.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_empty() {
        let config: WorkerConfig = "".parse().unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_full() {
        let toml = r#"
            [master]
            address = "master.internal:7000"
            connect_timeout_ms = 1000
            request_timeout_ms = 2000

            [worker]
            heartbeat_interval_ms = 500
            wait_poll_interval_ms = 250
            completion_grace_ms = 0
            max_wait_ms = 60000

            [app]
            learning_rate = "0.05"
        "#;

        let config: WorkerConfig = toml.parse().unwrap();

        assert_eq!(config.master.address, "master.internal:7000");
        assert_eq!(config.master.connect_timeout(), Duration::from_secs(1));
        assert_eq!(config.master.request_timeout(), Duration::from_secs(2));
        assert_eq!(config.worker.heartbeat_interval_ms, 500);
        assert_eq!(config.worker.wait_poll_interval_ms, 250);
        assert_eq!(config.worker.completion_grace_ms, 0);
        assert_eq!(config.worker.max_wait(), Some(Duration::from_secs(60)));
        assert_eq!(config.app_setting("learning_rate"), Some("0.05"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result: std::result::Result<WorkerConfig, _> = "invalid = [".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [master]
            address = "10.0.0.5:50051"
            "#
        )
        .unwrap();

        let config = WorkerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.master.address, "10.0.0.5:50051");
    }

    #[test]
    fn test_from_file_not_found() {
        let result = WorkerConfig::from_file("/nonexistent/worker.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_empty_address() {
        let mut config = WorkerConfig::default();
        config.master.address = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("master.address"));
    }

    #[test]
    fn test_validate_zero_intervals() {
        let mut config = WorkerConfig::default();
        config.worker.heartbeat_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = WorkerConfig::default();
        config.worker.wait_poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_grace_is_allowed() {
        let mut config = WorkerConfig::default();
        config.worker.completion_grace_ms = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_wait_below_poll_interval() {
        let mut config = WorkerConfig::default();
        config.worker.max_wait_ms = Some(10);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_wait_ms"));
    }

    #[test]
    fn test_merge_startup() {
        let mut config = WorkerConfig::default();
        config
            .app
            .insert("learning_rate".to_string(), "0.5".to_string());
        config.app.insert("seed".to_string(), "7".to_string());

        let startup = StartupConfiguration {
            split: FileSplit::new("/data/input.csv", 100, 900),
            batch_size: 32,
            iterations: 4,
            properties: BTreeMap::from([("learning_rate".to_string(), "0.01".to_string())]),
        };
        config.merge_startup(&startup);

        assert_eq!(config.app_setting(keys::INPUT_PATH), Some("/data/input.csv"));
        assert_eq!(config.app_setting_parsed::<u64>(keys::INPUT_OFFSET).unwrap(), Some(100));
        assert_eq!(config.app_setting_parsed::<u64>(keys::INPUT_LENGTH).unwrap(), Some(900));
        assert_eq!(config.app_setting_parsed::<usize>(keys::BATCH_SIZE).unwrap(), Some(32));
        assert_eq!(config.app_setting_parsed::<u32>(keys::ITERATIONS).unwrap(), Some(4));
        // Master wins over local settings, untouched keys survive
        assert_eq!(config.app_setting("learning_rate"), Some("0.01"));
        assert_eq!(config.app_setting("seed"), Some("7"));
    }

    #[test]
    fn test_app_setting_parsed_invalid() {
        let mut config = WorkerConfig::default();
        config.app.insert("batch_size".to_string(), "lots".to_string());

        assert!(config.app_setting_parsed::<usize>("batch_size").is_err());
        assert_eq!(config.app_setting_parsed::<usize>("missing").unwrap(), None);
    }

    // Helper to clear all IRW_ environment variables for test isolation
    fn clear_irw_env_vars() {
        for (key, _) in std::env::vars() {
            if key.starts_with("IRW_") {
                std::env::remove_var(&key);
            }
        }
    }

    // Environment variable tests are combined into a single test to avoid
    // races between parallel tests on the process-global environment.
    #[test]
    fn test_env_overrides() {
        clear_irw_env_vars();

        std::env::set_var("IRW_MASTER_ADDRESS", "env-master:9000");
        std::env::set_var("IRW_WORKER_HEARTBEAT_INTERVAL_MS", "750");
        std::env::set_var("IRW_WORKER_MAX_WAIT_MS", "30000");

        let config = WorkerConfig::default().with_env_overrides();

        assert_eq!(config.master.address, "env-master:9000");
        assert_eq!(config.worker.heartbeat_interval_ms, 750);
        assert_eq!(config.worker.max_wait_ms, Some(30_000));

        clear_irw_env_vars();

        // Invalid values are ignored
        std::env::set_var("IRW_WORKER_WAIT_POLL_INTERVAL_MS", "soon");

        let config = WorkerConfig::default().with_env_overrides();
        assert_eq!(config.worker.wait_poll_interval_ms, 1_000);

        clear_irw_env_vars();
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut original = WorkerConfig::default();
        original.app.insert("k".to_string(), "v".to_string());
        let toml_str = toml::to_string(&original).unwrap();
        let parsed: WorkerConfig = toml_str.parse().unwrap();

        assert_eq!(original.master.address, parsed.master.address);
        assert_eq!(
            original.worker.heartbeat_interval_ms,
            parsed.worker.heartbeat_interval_ms
        );
        assert_eq!(parsed.app_setting("k"), Some("v"));
    }
}
