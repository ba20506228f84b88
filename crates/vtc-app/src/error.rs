//! Error types for the vtc-app service layer.

use std::path::PathBuf;

use vtc_controls::ControlError;
use vtc_sim::SimError;

/// Application error type wrapping the backend crates' errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read config file: {path}")]
    ConfigFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Field device error during {operation}: {message}")]
    Device {
        operation: &'static str,
        message: String,
    },

    #[error("Control loop task failed: {0}")]
    Task(String),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for vtc-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn device(operation: &'static str, message: impl Into<String>) -> Self {
        AppError::Device {
            operation,
            message: message.into(),
        }
    }
}
