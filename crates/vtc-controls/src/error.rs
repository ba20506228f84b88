//! Error types for control system operations.

use thiserror::Error;

use crate::params::ParamName;

/// Result type for control system operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur in control system operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Invalid argument provided to a control function.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Plant parameters that no tuning rule can work with.
    #[error("Tuning rejected: {what}")]
    Tuning { what: &'static str },

    /// Controller time step was zero, negative or non-finite.
    #[error("Controller time step must be strictly positive (dt={dt})")]
    NonPositiveStep { dt: f64 },

    /// A parameter value of the wrong type or outside its valid range.
    #[error("Malformed value for {name}: {reason}")]
    MalformedValue { name: ParamName, reason: String },

    /// Unknown parameter label.
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),
}
