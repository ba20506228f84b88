//! Error types for plant simulation.

use thiserror::Error;
use vtc_core::CoreError;

/// Errors encountered while building or stepping a plant model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Time step must be strictly positive (dt={dt})")]
    NonPositiveStep { dt: f64 },

    #[error("Explicit Euler step is unstable: dt={dt} >= 2 * tau (tau={tau})")]
    UnstableStep { dt: f64, tau: f64 },

    #[error("Non-physical condition: {what}")]
    NonPhysical { what: &'static str },
}

pub type SimResult<T> = Result<T, SimError>;

impl From<CoreError> for SimError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::NonFinite { what, .. } => SimError::NonPhysical { what },
            CoreError::InvalidArg { what, .. } => SimError::InvalidArg { what },
        }
    }
}
