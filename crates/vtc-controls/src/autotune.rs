//! Controller gains from plant physics.
//!
//! Internal Model Control (IMC) tuning rules (Rivera, Morari, Skogestad 1986)
//! for the two plant structures the simulator provides:
//! - single first-order lag `K / (tau s + 1)` -> PI gains
//! - heater lag in series with a plant lag
//!   `K_h K_p / ((tau_h s + 1)(tau_p s + 1))` -> PID gains
//!
//! `aggressiveness` scales the desired closed-loop time constant `lambda`:
//! larger is slower and more robust, smaller is faster. Tuning runs once at
//! startup; the controller never re-tunes itself.

use serde::{Deserialize, Serialize};

use vtc_core::ensure_positive;

use crate::error::{ControlError, ControlResult};

pub const DEFAULT_AGGRESSIVENESS: f64 = 1.0;

/// Gains derived from a plant model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningResult {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Closed-loop time constant the gains were derived for (s).
    pub lambda: f64,
}

fn require_positive(value: f64, what: &'static str) -> ControlResult<f64> {
    ensure_positive(value, what).map_err(|_| ControlError::Tuning { what })
}

/// PI gains for a first-order lag with gain `k` and time constant `tau`.
///
/// `lambda = tau * aggressiveness`, `kp = tau / (k * lambda)`,
/// `ki = 1 / lambda`, `kd = 0`. Derivative action is left out for a single
/// lag since it only amplifies measurement noise there.
pub fn tune_single_lag(k: f64, tau: f64, aggressiveness: f64) -> ControlResult<TuningResult> {
    let k = require_positive(k, "plant gain must be positive")?;
    let tau = require_positive(tau, "plant time constant must be positive")?;
    let aggressiveness = require_positive(aggressiveness, "aggressiveness must be positive")?;

    let lambda = tau * aggressiveness;
    Ok(TuningResult {
        kp: tau / (k * lambda),
        ki: 1.0 / lambda,
        kd: 0.0,
        lambda,
    })
}

/// PID gains for a heater lag (`k_h`, `tau_h`) feeding a plant lag (`k_p`, `tau_p`).
///
/// With `K = k_h * k_p` and `T = tau_h + tau_p`:
/// `lambda = aggressiveness * T`, `kp = T / (K * lambda)`, `ki = 1 / lambda`,
/// `kd = tau_h * tau_p / T`.
pub fn tune_two_stage(
    k_h: f64,
    k_p: f64,
    tau_h: f64,
    tau_p: f64,
    aggressiveness: f64,
) -> ControlResult<TuningResult> {
    let k_h = require_positive(k_h, "heater gain must be positive")?;
    let k_p = require_positive(k_p, "plant gain must be positive")?;
    let tau_h = require_positive(tau_h, "heater time constant must be positive")?;
    let tau_p = require_positive(tau_p, "plant time constant must be positive")?;
    let aggressiveness = require_positive(aggressiveness, "aggressiveness must be positive")?;

    let k = k_h * k_p;
    let tau_sum = tau_h + tau_p;
    let lambda = aggressiveness * tau_sum;
    Ok(TuningResult {
        kp: tau_sum / (k * lambda),
        ki: 1.0 / lambda,
        kd: tau_h * tau_p / tau_sum,
        lambda,
    })
}
