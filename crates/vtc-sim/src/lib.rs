//! Thermal plant models for the virtual temperature controller.
//!
//! Provides:
//! - Generic first-order lag in deviation form
//! - Ambient-referenced thermal lag (absolute temperature in/out)
//! - Two-stage heater + plant lag
//! - `Plant`: the closed set of variants behind one `update(u, dt)` contract
//!
//! All models advance with explicit (forward) Euler. A step is rejected when
//! `dt` is not strictly positive or when `dt >= 2 * tau` for any time constant
//! in play, since forward Euler diverges past that bound.

pub mod error;
pub mod lag;
pub mod plant;
pub mod thermal;

pub use error::{SimError, SimResult};
pub use lag::{FirstOrderLag, check_step};
pub use plant::{Plant, PlantKind, PlantState};
pub use thermal::{ThermalPlant, TwoStageParams, TwoStagePlant};
