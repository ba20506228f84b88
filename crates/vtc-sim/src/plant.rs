//! The closed set of plant variants.

use serde::{Deserialize, Serialize};

use crate::error::SimResult;
use crate::lag::FirstOrderLag;
use crate::thermal::{ThermalPlant, TwoStagePlant};

/// Plant variant tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlantKind {
    FirstOrder,
    Thermal,
    TwoStage,
}

/// Snapshot of a plant's observable state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlantState {
    /// Absolute temperature (°C).
    pub temperature: f64,
    /// Effective heater output (W), two-stage plants only.
    pub heater_output: Option<f64>,
    /// Ambient reference (°C); zero for the generic lag.
    pub ambient: f64,
}

/// A plant selected once at startup.
///
/// Every variant shares the contract `update(control_input, dt) -> temperature`.
/// Configuration only builds `Thermal` (for `pt1`) and `TwoStage` (for
/// `two_pt1`); `FirstOrder` is the bare deviation-form lag for callers that
/// construct plants directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Plant {
    /// Generic lag; its state is reported as the temperature directly.
    FirstOrder(FirstOrderLag),
    Thermal(ThermalPlant),
    TwoStage(TwoStagePlant),
}

impl Plant {
    pub fn kind(&self) -> PlantKind {
        match self {
            Plant::FirstOrder(_) => PlantKind::FirstOrder,
            Plant::Thermal(_) => PlantKind::Thermal,
            Plant::TwoStage(_) => PlantKind::TwoStage,
        }
    }

    /// Advance one step with the given control input.
    pub fn update(&mut self, control_input: f64, dt: f64) -> SimResult<f64> {
        match self {
            Plant::FirstOrder(lag) => lag.update(control_input, dt),
            Plant::Thermal(plant) => plant.update(control_input, dt),
            Plant::TwoStage(plant) => plant.update(control_input, dt),
        }
    }

    pub fn temperature(&self) -> f64 {
        match self {
            Plant::FirstOrder(lag) => lag.state(),
            Plant::Thermal(plant) => plant.temperature(),
            Plant::TwoStage(plant) => plant.temperature(),
        }
    }

    /// Effective heater output; `None` unless the plant has a heater stage.
    pub fn heater_output(&self) -> Option<f64> {
        match self {
            Plant::TwoStage(plant) => Some(plant.heater_output()),
            _ => None,
        }
    }

    pub fn ambient(&self) -> f64 {
        match self {
            Plant::FirstOrder(_) => 0.0,
            Plant::Thermal(plant) => plant.ambient(),
            Plant::TwoStage(plant) => plant.ambient(),
        }
    }

    pub fn state(&self) -> PlantState {
        match self {
            Plant::FirstOrder(lag) => PlantState {
                temperature: lag.state(),
                heater_output: None,
                ambient: 0.0,
            },
            Plant::Thermal(plant) => PlantState {
                temperature: plant.temperature(),
                heater_output: None,
                ambient: plant.ambient(),
            },
            Plant::TwoStage(plant) => PlantState {
                temperature: plant.temperature(),
                heater_output: Some(plant.heater_output()),
                ambient: plant.ambient(),
            },
        }
    }

    /// Smallest time constant in play; bounds the usable step size.
    pub fn min_time_constant(&self) -> f64 {
        match self {
            Plant::FirstOrder(lag) => lag.tau(),
            Plant::Thermal(plant) => plant.tau(),
            Plant::TwoStage(plant) => {
                let p = plant.params();
                p.tau_h.min(p.tau_p)
            }
        }
    }
}
