//! Unified error handling for Pifan
//!
//! Every fallible operation in the controller returns [`Result`], so the
//! control loop can tell a recoverable sensor fault from a fatal one by
//! matching on [`PifanError`].

use std::io;
use std::path::PathBuf;

/// Result type alias using PifanError
pub type Result<T> = std::result::Result<T, PifanError>;

/// Unified error type for all Pifan operations
#[derive(thiserror::Error, Debug)]
pub enum PifanError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Failed to parse configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    // ============================================================================
    // Hardware Access Errors
    // ============================================================================
    #[error("Failed to read temperature from {path}: {reason}")]
    TemperatureRead {
        path: PathBuf,
        reason: String,
    },

    #[error("Failed to initialize PWM on GPIO {pin}: {reason}")]
    PwmInit {
        pin: u8,
        reason: String,
    },

    #[error("Failed to write PWM on GPIO {pin}: {reason}")]
    PwmWrite {
        pin: u8,
        reason: String,
    },

    #[error("PWM actuator already released")]
    ActuatorReleased,

    // ============================================================================
    // Validation Errors
    // ============================================================================
    #[error("Invalid percentage: {value} (must be 0.0-100.0)")]
    InvalidPercentage {
        value: f64,
    },

    // ============================================================================
    // Process Errors
    // ============================================================================
    #[error("Failed to register handler for {signal}: {source}")]
    SignalSetup {
        signal: &'static str,
        source: io::Error,
    },
}

impl PifanError {
    /// Create an invalid config error for a named field
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that originate in the PWM hardware path
    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            Self::PwmInit { .. } | Self::PwmWrite { .. } | Self::ActuatorReleased
        )
    }
}
