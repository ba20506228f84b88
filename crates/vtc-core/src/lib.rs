//! vtc-core: shared foundation for the virtual temperature controller.
//!
//! Contains:
//! - numeric (finiteness and positivity guards)
//! - timing (accumulated loop timing statistics)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod timing;

pub use error::{CoreError, CoreResult};
pub use numeric::{ensure_finite, ensure_positive};
pub use timing::{AccumulatingTimer, LoopTimings};
