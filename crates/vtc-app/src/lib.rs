//! Application layer for the virtual temperature controller.
//!
//! Wires the plant models and the controller into a running device:
//! configuration, the field-device boundary, the startup sequence (tune,
//! seed, read back), the fast-tick/publish orchestrator, and an offline
//! simulation that runs the same loop on simulated time.

pub mod config;
pub mod control_loop;
pub mod device;
pub mod error;
pub mod memory;
pub mod offline;
pub mod orchestrator;
pub mod startup;

pub use config::{ConfigOverrides, ControllerConfig, PlantConfig, PlantType, seconds_to_duration};
pub use control_loop::{ControlLoop, LoopSnapshot, SharedController};
pub use device::{FieldDevice, StateName, StateValue, Subscription};
pub use error::{AppError, AppResult};
pub use memory::MemoryDevice;
pub use offline::{Sample, ScheduledChange, SimulateOptions, simulate, write_csv, write_jsonl};
pub use orchestrator::{RunSummary, run_controller};
pub use startup::{Startup, StartupPlan, initialize, plan, tune};
