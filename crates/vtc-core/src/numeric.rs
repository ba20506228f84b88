//! Guards for physical parameters and step sizes.

use crate::{CoreError, CoreResult};

pub fn ensure_finite(v: f64, what: &'static str) -> CoreResult<f64> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Finite and strictly greater than zero.
///
/// Gains, time constants and step sizes all share this requirement.
pub fn ensure_positive(v: f64, what: &'static str) -> CoreResult<f64> {
    let v = ensure_finite(v, what)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(CoreError::InvalidArg { what, value: v })
    }
}
