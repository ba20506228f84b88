//! One fast tick of the closed loop.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use vtc_controls::PidController;
use vtc_sim::Plant;

use crate::error::AppResult;

/// Controller shared between the fast tick and the parameter channel.
pub type SharedController = Arc<Mutex<PidController>>;

/// Loop state after a fast tick, as seen by the publish step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoopSnapshot {
    pub tick: u64,
    /// Simulated seconds since start.
    pub sim_time: f64,
    pub temperature: f64,
    pub control_output: f64,
    pub setpoint: f64,
    pub heater_output: Option<f64>,
}

/// Plant plus shared controller, advanced one `dt` per tick.
///
/// Each tick feeds the plant the output computed on the previous tick, then
/// computes a new output from the fresh temperature. The controller lock is
/// held only for the compute, never across an await.
#[derive(Debug)]
pub struct ControlLoop {
    plant: Plant,
    controller: SharedController,
    dt: f64,
    control_output: f64,
    ticks: u64,
}

impl ControlLoop {
    pub fn new(plant: Plant, controller: SharedController, dt: f64) -> Self {
        Self {
            plant,
            controller,
            dt,
            control_output: 0.0,
            ticks: 0,
        }
    }

    pub fn controller(&self) -> &SharedController {
        &self.controller
    }

    pub fn plant(&self) -> &Plant {
        &self.plant
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Snapshot of the current state without advancing.
    pub fn snapshot(&self) -> LoopSnapshot {
        LoopSnapshot {
            tick: self.ticks,
            sim_time: self.ticks as f64 * self.dt,
            temperature: self.plant.temperature(),
            control_output: self.control_output,
            setpoint: self.controller.lock().setpoint(),
            heater_output: self.plant.heater_output(),
        }
    }

    /// Advance the plant and recompute the control output.
    pub fn tick(&mut self) -> AppResult<LoopSnapshot> {
        let temperature = self.plant.update(self.control_output, self.dt)?;
        let (output, setpoint) = {
            let mut pid = self.controller.lock();
            (pid.compute(temperature, self.dt)?, pid.setpoint())
        };
        self.control_output = output;
        self.ticks += 1;
        tracing::trace!(tick = self.ticks, temperature, output, "fast tick");
        Ok(LoopSnapshot {
            tick: self.ticks,
            sim_time: self.ticks as f64 * self.dt,
            temperature,
            control_output: output,
            setpoint,
            heater_output: self.plant.heater_output(),
        })
    }
}
