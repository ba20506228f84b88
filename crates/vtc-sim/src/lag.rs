//! Generic first-order lag.
//!
//! Dynamics in deviation form: `dx/dt = (-x + K * u) / tau`, i.e. the
//! transfer function `K / (tau s + 1)`. Operating-point offsets such as an
//! ambient temperature belong to the wrapping model, not here.

use serde::{Deserialize, Serialize};
use vtc_core::{ensure_finite, ensure_positive};

use crate::error::{SimError, SimResult};

/// Validate a step size against a time constant.
///
/// Forward Euler on a first-order lag multiplies the deviation by
/// `1 - dt / tau` each step, so `dt >= 2 * tau` no longer decays.
pub fn check_step(dt: f64, tau: f64) -> SimResult<()> {
    if !(dt.is_finite() && dt > 0.0) {
        return Err(SimError::NonPositiveStep { dt });
    }
    if dt >= 2.0 * tau {
        return Err(SimError::UnstableStep { dt, tau });
    }
    Ok(())
}

/// First-order lag state and parameters.
///
/// # Example
///
/// ```
/// use vtc_sim::FirstOrderLag;
///
/// let mut lag = FirstOrderLag::new(1.0, 10.0, 0.0).unwrap();
/// let x = lag.update(1.0, 1.0).unwrap();
/// assert!((x - 0.1).abs() < 1e-12);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FirstOrderLag {
    /// Static gain.
    k: f64,
    /// Time constant (seconds), strictly positive.
    tau: f64,
    /// Current state (deviation).
    x: f64,
}

impl FirstOrderLag {
    /// Create a lag with gain `k`, time constant `tau` and initial state `x0`.
    ///
    /// # Errors
    ///
    /// Returns error if `tau` is not strictly positive or any value is non-finite.
    pub fn new(k: f64, tau: f64, x0: f64) -> SimResult<Self> {
        let k = ensure_finite(k, "lag gain must be finite")?;
        let tau = ensure_positive(tau, "lag time constant must be positive")?;
        let x = ensure_finite(x0, "lag initial state must be finite")?;
        Ok(Self { k, tau, x })
    }

    pub fn gain(&self) -> f64 {
        self.k
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    pub fn state(&self) -> f64 {
        self.x
    }

    /// Advance by one explicit Euler step and return the new state.
    pub fn update(&mut self, u: f64, dt: f64) -> SimResult<f64> {
        check_step(dt, self.tau)?;
        self.advance(u, dt);
        Ok(self.x)
    }

    /// Euler step without validation; callers must have run `check_step`.
    pub(crate) fn advance(&mut self, u: f64, dt: f64) {
        let dx = dt / self.tau * (-self.x + self.k * u);
        self.x += dx;
    }
}
