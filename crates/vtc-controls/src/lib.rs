//! Controller primitives for the virtual temperature controller.
//!
//! This crate holds everything between a measured temperature and a heater
//! command:
//! - **PID controller** with independently enabled terms, integral clamping
//!   and output saturation
//! - **Autotuning** of controller gains from plant physics (IMC rules)
//! - **Parameters**: the names and values an external writer may change at
//!   runtime, and their per-field application to a running controller
//! - **Alarms**: over-temperature condition evaluated at publish time
//! - **Deadline clock** for the publish cadence
//!
//! Plant models live in `vtc-sim`; this crate does not depend on them so the
//! tuning rules take plain physical parameters.

pub mod alarm;
pub mod autotune;
pub mod error;
pub mod params;
pub mod pid;
pub mod sampled;

pub use alarm::{AlarmCondition, OverTemperatureAlarm};
pub use autotune::{DEFAULT_AGGRESSIVENESS, TuningResult, tune_single_lag, tune_two_stage};
pub use error::{ControlError, ControlResult};
pub use params::{ParamName, ParamValue, ParameterChange};
pub use pid::{PidConfig, PidController};
pub use sampled::DeadlineClock;
