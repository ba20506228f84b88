//! Thermal plants with an ambient reference.
//!
//! Both models keep their dynamics in deviation form (temperature above
//! ambient) and report absolute temperature: `temp = ambient + deviation`.

use serde::{Deserialize, Serialize};
use vtc_core::ensure_finite;

use crate::error::SimResult;
use crate::lag::{FirstOrderLag, check_step};

/// First-order thermal plant: `dT/dt = (-(T - T_amb) + K * u) / tau`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThermalPlant {
    lag: FirstOrderLag,
    ambient: f64,
    temperature: f64,
}

impl ThermalPlant {
    /// Create a thermal plant.
    ///
    /// # Arguments
    ///
    /// * `initial_temp` - Initial absolute temperature (°C)
    /// * `ambient` - Ambient temperature (°C)
    /// * `tau` - Thermal time constant (s)
    /// * `heater_gain` - Temperature rise per unit control input (°C/unit)
    pub fn new(initial_temp: f64, ambient: f64, tau: f64, heater_gain: f64) -> SimResult<Self> {
        let initial_temp = ensure_finite(initial_temp, "initial temperature must be finite")?;
        let ambient = ensure_finite(ambient, "ambient temperature must be finite")?;
        Ok(Self {
            lag: FirstOrderLag::new(heater_gain, tau, initial_temp - ambient)?,
            ambient,
            temperature: initial_temp,
        })
    }

    pub fn tau(&self) -> f64 {
        self.lag.tau()
    }

    pub fn heater_gain(&self) -> f64 {
        self.lag.gain()
    }

    pub fn ambient(&self) -> f64 {
        self.ambient
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Advance one step with heater command `control_output`; returns absolute temperature.
    pub fn update(&mut self, control_output: f64, dt: f64) -> SimResult<f64> {
        let deviation = self.lag.update(control_output, dt)?;
        self.temperature = self.ambient + deviation;
        Ok(self.temperature)
    }
}

/// Physical parameters of the two-stage plant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TwoStageParams {
    /// Heater gain (W per unit command).
    pub k_h: f64,
    /// Heater time constant (s).
    pub tau_h: f64,
    /// Plant gain (°C per W).
    pub k_p: f64,
    /// Plant time constant (s).
    pub tau_p: f64,
}

impl Default for TwoStageParams {
    fn default() -> Self {
        Self {
            k_h: 100.0,
            tau_h: 1.0,
            k_p: 0.5,
            tau_p: 10.0,
        }
    }
}

/// Heater lag feeding a plant lag:
///
/// ```text
/// Heater: dQ/dt = (-Q + K_h * u) / tau_h
/// Plant:  dT/dt = (-(T - T_amb) + K_p * Q) / tau_p
/// ```
///
/// Per step the heater advances first, then the plant advances using the
/// heater output just computed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TwoStagePlant {
    heater: FirstOrderLag,
    plant: FirstOrderLag,
    ambient: f64,
}

impl TwoStagePlant {
    /// Create a two-stage plant with the heater at rest (zero output).
    pub fn new(initial_temp: f64, ambient: f64, params: TwoStageParams) -> SimResult<Self> {
        let initial_temp = ensure_finite(initial_temp, "initial temperature must be finite")?;
        let ambient = ensure_finite(ambient, "ambient temperature must be finite")?;
        Ok(Self {
            heater: FirstOrderLag::new(params.k_h, params.tau_h, 0.0)?,
            plant: FirstOrderLag::new(params.k_p, params.tau_p, initial_temp - ambient)?,
            ambient,
        })
    }

    pub fn params(&self) -> TwoStageParams {
        TwoStageParams {
            k_h: self.heater.gain(),
            tau_h: self.heater.tau(),
            k_p: self.plant.gain(),
            tau_p: self.plant.tau(),
        }
    }

    pub fn ambient(&self) -> f64 {
        self.ambient
    }

    /// Effective heater output (W).
    pub fn heater_output(&self) -> f64 {
        self.heater.state()
    }

    pub fn temperature(&self) -> f64 {
        self.ambient + self.plant.state()
    }

    /// Advance both stages by one step; returns absolute plant temperature.
    pub fn update(&mut self, u: f64, dt: f64) -> SimResult<f64> {
        // Validate against both stages before mutating either.
        check_step(dt, self.heater.tau())?;
        check_step(dt, self.plant.tau())?;
        self.heater.advance(u, dt);
        self.plant.advance(self.heater.state(), dt);
        Ok(self.temperature())
    }
}
