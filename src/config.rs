use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::TransferError;
use crate::schedule::ScheduleBounds;

// Endpoint constants
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 12345;

// Schedule constants
pub const MAX_DEADLINE_MICROS: u64 = 200;
pub const MAX_WINDOW_BYTES: usize = 1024 * 1024; // 1MB

pub const DEFAULT_FILE: &str = "/usr/bin/emacs";
pub const PROGRESS_BAR_ENABLED: bool = false;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoint: EndpointConfig,
    pub sender: SenderConfig,
    pub receiver: ReceiverConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// File streamed to the receiver
    pub file: PathBuf,
    pub progress_bar: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Reference file the received bytes are compared against
    pub file: PathBuf,
    pub progress_bar: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub max_deadline_micros: u64,
    pub max_window_bytes: usize,
    /// Fixed seed for a reproducible run; seeded from system time when unset
    pub seed: Option<u64>,
}

impl Config {
    pub fn load_or_default(path: &Path) -> Result<Self, TransferError> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            tracing::debug!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            tracing::info!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), TransferError> {
        if self.endpoint.address.trim().is_empty() {
            return Err(TransferError::ConfigError("endpoint.address must not be empty".to_string()));
        }
        if self.schedule.max_deadline_micros == 0 {
            return Err(TransferError::ConfigError("schedule.max_deadline_micros must be positive".to_string()));
        }
        if self.schedule.max_window_bytes == 0 {
            return Err(TransferError::ConfigError("schedule.max_window_bytes must be positive".to_string()));
        }
        Ok(())
    }
}

impl EndpointConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl ScheduleConfig {
    pub fn bounds(&self) -> ScheduleBounds {
        ScheduleBounds {
            max_deadline: Duration::from_micros(self.max_deadline_micros),
            max_window: self.max_window_bytes,
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_FILE),
            progress_bar: PROGRESS_BAR_ENABLED,
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_FILE),
            progress_bar: PROGRESS_BAR_ENABLED,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            max_deadline_micros: MAX_DEADLINE_MICROS,
            max_window_bytes: MAX_WINDOW_BYTES,
            seed: None,
        }
    }
}
