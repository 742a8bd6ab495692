//! Process-level settings of the bootstrap itself.
//!
//! These come from the pod spec's environment, not from the hand-off documents.

use std::{path::PathBuf, time::Duration};

use podlaunch_observe::{LoggerFormat, LoggerLevel};
use thiserror::Error;

use crate::handoff::{CONFIG_DIR, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};

/// Root of the lifecycle documents.
///
/// Changing it orphans every pod already running under the old prefix: their watchers
/// keep reading the old location. Treat it as a versioned constant.
pub const STATE_STORAGE_PREFIX: &str = "/state";

/// Port the heartbeat server listens on in cluster mode.
pub const HEARTBEAT_PORT: u16 = 9000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub config_dir: PathBuf,
    pub handoff_timeout: Duration,
    pub poll_interval: Duration,
    pub state_prefix: PathBuf,
    pub heartbeat_port: u16,
    pub log_format: LoggerFormat,
    pub log_level: LoggerLevel,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(CONFIG_DIR),
            handoff_timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            state_prefix: PathBuf::from(STATE_STORAGE_PREFIX),
            heartbeat_port: HEARTBEAT_PORT,
            log_format: LoggerFormat::Text,
            log_level: LoggerLevel::default(),
        }
    }
}

impl BootstrapConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(dir) = lookup("PODLAUNCH_CONFIG_DIR") {
            cfg.config_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("PODLAUNCH_HANDOFF_TIMEOUT_SECS") {
            let parsed = secs.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: "PODLAUNCH_HANDOFF_TIMEOUT_SECS",
                value: secs.clone(),
                reason: e.to_string(),
            })?;
            cfg.handoff_timeout = Duration::from_secs(parsed);
        }
        if let Some(prefix) = lookup("PODLAUNCH_STATE_PREFIX") {
            cfg.state_prefix = PathBuf::from(prefix);
        }
        if let Some(port) = lookup("PODLAUNCH_HEARTBEAT_PORT") {
            cfg.heartbeat_port = port.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "PODLAUNCH_HEARTBEAT_PORT",
                value: port.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(format) = lookup("PODLAUNCH_LOG_FORMAT") {
            cfg.log_format = format
                .parse::<LoggerFormat>()
                .map_err(|e| ConfigError::Invalid {
                    key: "PODLAUNCH_LOG_FORMAT",
                    value: format.clone(),
                    reason: e.to_string(),
                })?;
        }
        if let Some(level) = lookup("PODLAUNCH_LOG_LEVEL") {
            cfg.log_level = LoggerLevel::new(level.clone()).map_err(|e| ConfigError::Invalid {
                key: "PODLAUNCH_LOG_LEVEL",
                value: level,
                reason: e.to_string(),
            })?;
        }

        Ok(cfg)
    }
}
