//! Controller configuration.
//!
//! Sources, lowest to highest precedence: built-in defaults, an optional YAML
//! file, then [`ConfigOverrides`] (filled by the CLI from flags and
//! environment variables). The result is validated once before startup.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vtc_controls::{DEFAULT_AGGRESSIVENESS, PidConfig};
use vtc_sim::{Plant, ThermalPlant, TwoStageParams, TwoStagePlant};

use crate::error::{AppError, AppResult};

const DEFAULT_TAU: f64 = 10.0;
const DEFAULT_K: f64 = 1.0;

/// Seconds as a timer period.
///
/// Rejects values a `Duration` cannot hold and values that truncate to zero
/// (below one nanosecond).
pub fn seconds_to_duration(what: &str, seconds: f64) -> AppResult<Duration> {
    match Duration::try_from_secs_f64(seconds) {
        Ok(period) if !period.is_zero() => Ok(period),
        _ => Err(AppError::Config(format!(
            "{what} must be between 1 ns and {} s, got {seconds}",
            Duration::MAX.as_secs()
        ))),
    }
}

fn default_tau() -> f64 {
    DEFAULT_TAU
}

fn default_k() -> f64 {
    DEFAULT_K
}

fn default_tau_p() -> f64 {
    TwoStageParams::default().tau_p
}

fn default_k_p() -> f64 {
    TwoStageParams::default().k_p
}

fn default_tau_h() -> f64 {
    TwoStageParams::default().tau_h
}

fn default_k_h() -> f64 {
    TwoStageParams::default().k_h
}

/// Plant selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlantType {
    #[serde(rename = "pt1")]
    Pt1,
    #[serde(rename = "two_pt1")]
    TwoPt1,
}

/// Plant variant and its physical parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PlantConfig {
    /// Single thermal lag.
    #[serde(rename = "pt1")]
    Pt1 {
        /// Thermal time constant (s).
        #[serde(default = "default_tau")]
        tau: f64,
        /// Temperature rise per unit control input (°C/unit).
        #[serde(default = "default_k")]
        k: f64,
    },
    /// Heater lag in series with a plant lag.
    #[serde(rename = "two_pt1")]
    TwoPt1 {
        #[serde(default = "default_tau_p")]
        tau_p: f64,
        #[serde(default = "default_k_p")]
        k_p: f64,
        #[serde(default = "default_tau_h")]
        tau_h: f64,
        #[serde(default = "default_k_h")]
        k_h: f64,
    },
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self::defaults_for(PlantType::TwoPt1)
    }
}

impl PlantConfig {
    pub fn defaults_for(plant_type: PlantType) -> Self {
        match plant_type {
            PlantType::Pt1 => PlantConfig::Pt1 {
                tau: DEFAULT_TAU,
                k: DEFAULT_K,
            },
            PlantType::TwoPt1 => {
                let p = TwoStageParams::default();
                PlantConfig::TwoPt1 {
                    tau_p: p.tau_p,
                    k_p: p.k_p,
                    tau_h: p.tau_h,
                    k_h: p.k_h,
                }
            }
        }
    }

    pub fn plant_type(&self) -> PlantType {
        match self {
            PlantConfig::Pt1 { .. } => PlantType::Pt1,
            PlantConfig::TwoPt1 { .. } => PlantType::TwoPt1,
        }
    }

    fn time_constants(&self) -> Vec<(&'static str, f64)> {
        match self {
            PlantConfig::Pt1 { tau, .. } => vec![("tau", *tau)],
            PlantConfig::TwoPt1 { tau_p, tau_h, .. } => vec![("tau_p", *tau_p), ("tau_h", *tau_h)],
        }
    }
}

/// Everything the controller reads once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub plant: PlantConfig,
    /// Initial absolute plant temperature (°C).
    pub initial_temperature: f64,
    /// Ambient temperature (°C).
    pub ambient_temperature: f64,
    /// Fast-tick period (s).
    pub dt_sim: f64,
    /// Publish period (s).
    pub update_interval: f64,
    /// Tuning speed factor; larger is slower and more robust.
    pub aggressiveness: f64,
    /// Parameter values the field device starts out with.
    pub defaults: PidConfig,
    /// Source name attached to alarms.
    pub alarm_source: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            plant: PlantConfig::default(),
            initial_temperature: 22.0,
            ambient_temperature: 20.0,
            dt_sim: 0.1,
            update_interval: 1.0,
            aggressiveness: DEFAULT_AGGRESSIVENESS,
            defaults: PidConfig::default(),
            alarm_source: vtc_controls::alarm::DEFAULT_ALARM_SOURCE.to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load a YAML config file; missing fields take their defaults.
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| AppError::ConfigFileRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| AppError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject configurations the control loop cannot run with.
    ///
    /// Plant gains are checked by the tuning step, which owns that rule.
    pub fn validate(&self) -> AppResult<()> {
        let finite = [
            ("initial_temperature", self.initial_temperature),
            ("ambient_temperature", self.ambient_temperature),
            ("dt_sim", self.dt_sim),
            ("update_interval", self.update_interval),
            ("aggressiveness", self.aggressiveness),
        ];
        for (what, value) in finite {
            if !value.is_finite() {
                return Err(AppError::Config(format!("{what} must be finite, got {value}")));
            }
        }
        for (what, value) in [
            ("dt_sim", self.dt_sim),
            ("update_interval", self.update_interval),
            ("aggressiveness", self.aggressiveness),
        ] {
            if value <= 0.0 {
                return Err(AppError::Config(format!("{what} must be positive, got {value}")));
            }
        }
        self.tick_period()?;
        self.publish_period()?;
        for (what, tau) in self.plant.time_constants() {
            if !(tau.is_finite() && tau > 0.0) {
                return Err(AppError::Config(format!("{what} must be positive, got {tau}")));
            }
            if self.dt_sim >= 2.0 * tau {
                return Err(AppError::Config(format!(
                    "dt_sim {} is too large for {what} = {tau}: explicit Euler needs dt_sim < 2 * {what}",
                    self.dt_sim
                )));
            }
            if self.dt_sim > tau / 10.0 {
                tracing::warn!(
                    dt_sim = self.dt_sim,
                    time_constant = what,
                    tau,
                    "dt_sim is coarse relative to the plant time constant; results will be inaccurate"
                );
            }
        }
        Ok(())
    }

    /// Fast-tick period as a timer duration.
    pub fn tick_period(&self) -> AppResult<Duration> {
        seconds_to_duration("dt_sim", self.dt_sim)
    }

    /// Publish period as a timer duration.
    pub fn publish_period(&self) -> AppResult<Duration> {
        seconds_to_duration("update_interval", self.update_interval)
    }

    /// Build the configured plant at its initial temperature.
    pub fn build_plant(&self) -> AppResult<Plant> {
        let plant = match &self.plant {
            PlantConfig::Pt1 { tau, k } => Plant::Thermal(ThermalPlant::new(
                self.initial_temperature,
                self.ambient_temperature,
                *tau,
                *k,
            )?),
            PlantConfig::TwoPt1 {
                tau_p,
                k_p,
                tau_h,
                k_h,
            } => Plant::TwoStage(TwoStagePlant::new(
                self.initial_temperature,
                self.ambient_temperature,
                TwoStageParams {
                    k_h: *k_h,
                    tau_h: *tau_h,
                    k_p: *k_p,
                    tau_p: *tau_p,
                },
            )?),
        };
        Ok(plant)
    }
}

/// Highest-precedence settings, typically from CLI flags and environment.
///
/// Plant parameters only apply to the variant they belong to; switching the
/// plant type first resets the plant to that type's defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub plant_type: Option<PlantType>,
    pub initial_temperature: Option<f64>,
    pub ambient_temperature: Option<f64>,
    pub tau: Option<f64>,
    pub k: Option<f64>,
    pub tau_p: Option<f64>,
    pub k_p: Option<f64>,
    pub tau_h: Option<f64>,
    pub k_h: Option<f64>,
    pub dt_sim: Option<f64>,
    pub update_interval: Option<f64>,
    pub aggressiveness: Option<f64>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut ControllerConfig) {
        if let Some(plant_type) = self.plant_type {
            if plant_type != config.plant.plant_type() {
                config.plant = PlantConfig::defaults_for(plant_type);
            }
        }
        match &mut config.plant {
            PlantConfig::Pt1 { tau, k } => {
                set(tau, self.tau);
                set(k, self.k);
            }
            PlantConfig::TwoPt1 {
                tau_p,
                k_p,
                tau_h,
                k_h,
            } => {
                set(tau_p, self.tau_p);
                set(k_p, self.k_p);
                set(tau_h, self.tau_h);
                set(k_h, self.k_h);
            }
        }
        set(&mut config.initial_temperature, self.initial_temperature);
        set(&mut config.ambient_temperature, self.ambient_temperature);
        set(&mut config.dt_sim, self.dt_sim);
        set(&mut config.update_interval, self.update_interval);
        set(&mut config.aggressiveness, self.aggressiveness);
    }
}

fn set(slot: &mut f64, value: Option<f64>) {
    if let Some(v) = value {
        *slot = v;
    }
}
