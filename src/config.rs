//! Accelerator configuration

use serde::{Deserialize, Serialize};

use crate::drive::LatencyProfile;

/// Default configuration constants
///
/// This module centralizes all default values used throughout stripefs.
/// By collecting these constants in one place, we ensure consistency
/// and make it easier to adjust defaults for different simulation
/// scenarios.
pub mod defaults {

    // Accelerator defaults
    /// Default number of simulated drives
    pub const NUM_DRIVES: usize = 16;

    /// Default hash seed string
    pub const fn default_hash_seed() -> &'static str {
        "default_seed"
    }

    /// Block size used to split read/write operations for routing: 4KB
    pub const BLOCK_SIZE: usize = 4096;

    /// Per-operation wait deadline: 5 seconds
    pub const OP_TIMEOUT_MS: u64 = 5000;

    // Drive defaults
    /// Request queue capacity per drive
    pub const QUEUE_CAPACITY: usize = 1000;

    /// Pending-ops threshold above which the load balancer redirects
    pub const MAX_PENDING_OPS: usize = 1000;

    /// Artificial READ latency in milliseconds
    pub const READ_LATENCY_MS: u64 = 2;

    /// Artificial WRITE latency in milliseconds
    pub const WRITE_LATENCY_MS: u64 = 3;

    /// Artificial TRUNCATE latency in milliseconds
    pub const TRUNCATE_LATENCY_MS: u64 = 2;

    /// Artificial RENAME latency in milliseconds
    pub const RENAME_LATENCY_MS: u64 = 2;

    /// Artificial latency for all other operation types in milliseconds
    pub const METADATA_LATENCY_MS: u64 = 1;

    // Log level
    /// Default log level
    pub const fn default_log_level() -> &'static str {
        "info"
    }
}

/// Full accelerator configuration
///
/// Options are fixed at accelerator construction; there is no hot
/// reconfiguration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceleratorConfig {
    /// Accelerator-level configuration
    pub accelerator: CoreConfig,

    /// Per-drive configuration
    pub drive: DriveConfig,
}

/// Accelerator-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Number of simulated drives
    #[serde(default = "default_num_drives")]
    pub num_drives: usize,

    /// Seed string for the keyed hasher
    #[serde(default = "default_hash_seed")]
    pub hash_seed: String,

    /// Block size in bytes for read/write routing
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Per-operation wait deadline in milliseconds
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_num_drives() -> usize {
    defaults::NUM_DRIVES
}

fn default_hash_seed() -> String {
    defaults::default_hash_seed().to_string()
}

fn default_block_size() -> usize {
    defaults::BLOCK_SIZE
}

fn default_op_timeout_ms() -> u64 {
    defaults::OP_TIMEOUT_MS
}

fn default_log_level() -> String {
    defaults::default_log_level().to_string()
}

/// Per-drive configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Request queue capacity; a submission against a full queue fails
    /// fast with busy instead of blocking
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Pending-ops threshold above which the load balancer redirects
    /// away from the primary drive
    #[serde(default = "default_max_pending_ops")]
    pub max_pending_ops: usize,

    /// Artificial READ latency in milliseconds
    #[serde(default = "default_read_latency")]
    pub read_latency_ms: u64,

    /// Artificial WRITE latency in milliseconds
    #[serde(default = "default_write_latency")]
    pub write_latency_ms: u64,

    /// Artificial TRUNCATE latency in milliseconds
    #[serde(default = "default_truncate_latency")]
    pub truncate_latency_ms: u64,

    /// Artificial RENAME latency in milliseconds
    #[serde(default = "default_rename_latency")]
    pub rename_latency_ms: u64,

    /// Artificial latency for all other operation types in milliseconds
    #[serde(default = "default_metadata_latency")]
    pub metadata_latency_ms: u64,
}

fn default_queue_capacity() -> usize {
    defaults::QUEUE_CAPACITY
}

fn default_max_pending_ops() -> usize {
    defaults::MAX_PENDING_OPS
}

fn default_read_latency() -> u64 {
    defaults::READ_LATENCY_MS
}

fn default_write_latency() -> u64 {
    defaults::WRITE_LATENCY_MS
}

fn default_truncate_latency() -> u64 {
    defaults::TRUNCATE_LATENCY_MS
}

fn default_rename_latency() -> u64 {
    defaults::RENAME_LATENCY_MS
}

fn default_metadata_latency() -> u64 {
    defaults::METADATA_LATENCY_MS
}

impl DriveConfig {
    /// Build the latency profile the drive workers apply per operation
    pub fn latency_profile(&self) -> LatencyProfile {
        LatencyProfile::from_millis(
            self.read_latency_ms,
            self.write_latency_ms,
            self.truncate_latency_ms,
            self.rename_latency_ms,
            self.metadata_latency_ms,
        )
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            num_drives: default_num_drives(),
            hash_seed: default_hash_seed(),
            block_size: default_block_size(),
            op_timeout_ms: default_op_timeout_ms(),
            log_level: default_log_level(),
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_pending_ops: default_max_pending_ops(),
            read_latency_ms: default_read_latency(),
            write_latency_ms: default_write_latency(),
            truncate_latency_ms: default_truncate_latency(),
            rename_latency_ms: default_rename_latency(),
            metadata_latency_ms: default_metadata_latency(),
        }
    }
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self {
            accelerator: CoreConfig::default(),
            drive: DriveConfig::default(),
        }
    }
}

impl AcceleratorConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("Failed to read config file: {}", e)))?;

        let config: AcceleratorConfig = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self).map_err(|e| {
            ConfigError::SerializeError(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, contents)
            .map_err(|e| ConfigError::WriteError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate drive count
        if self.accelerator.num_drives == 0 || self.accelerator.num_drives > 1024 {
            return Err(ConfigError::ValidationError(
                "Drive count must be between 1 and 1024".to_string(),
            ));
        }

        // Validate block size (must be > 0 and <= 16MB)
        if self.accelerator.block_size == 0 || self.accelerator.block_size > 16 * 1024 * 1024 {
            return Err(ConfigError::ValidationError(
                "Block size must be between 1 and 16MB".to_string(),
            ));
        }

        // Validate deadline
        if self.accelerator.op_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "Operation timeout must be non-zero".to_string(),
            ));
        }

        // Validate queue capacity
        if self.drive.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "Queue capacity must be non-zero".to_string(),
            ));
        }

        // Validate log level
        match self.accelerator.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}",
                    self.accelerator.log_level
                )));
            }
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Failed to serialize config: {0}")]
    SerializeError(String),

    #[error("Failed to write config: {0}")]
    WriteError(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}
