// Configuration error types and constants

use crate::error::ErrorCode;
use std::fmt;

/// Configuration error code constants
///
/// Error code range: 3001-3005
pub struct ConfigErrorCodes;

impl ConfigErrorCodes {
    /// Config file could not be read
    pub const IO: i32 = 3001;

    /// Timing tunables violate their ordering constraints
    pub const INVALID_TIMING: i32 = 3002;

    /// Note band table is malformed or overlapping
    pub const INVALID_BANDS: i32 = 3003;

    /// Config file is not valid JSON for `AppConfig`
    pub const PARSE: i32 = 3004;

    /// A numeric setting is outside its allowed range
    pub const INVALID_VALUE: i32 = 3005;
}

/// Errors raised while loading or validating configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Io { path: String, reason: String },
    InvalidTiming { reason: String },
    InvalidBands { reason: String },
    Parse { path: String, reason: String },
    InvalidValue { field: String, reason: String },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::Io { .. } => ConfigErrorCodes::IO,
            ConfigError::InvalidTiming { .. } => ConfigErrorCodes::INVALID_TIMING,
            ConfigError::InvalidBands { .. } => ConfigErrorCodes::INVALID_BANDS,
            ConfigError::Parse { .. } => ConfigErrorCodes::PARSE,
            ConfigError::InvalidValue { .. } => ConfigErrorCodes::INVALID_VALUE,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::Io { path, reason } => format!("Failed to read {}: {}", path, reason),
            ConfigError::InvalidTiming { reason } => format!("Invalid timing: {}", reason),
            ConfigError::InvalidBands { reason } => format!("Invalid note bands: {}", reason),
            ConfigError::Parse { path, reason } => {
                format!("Failed to parse {}: {}", path, reason)
            }
            ConfigError::InvalidValue { field, reason } => {
                format!("Invalid value for {}: {}", field, reason)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ConfigError {}
