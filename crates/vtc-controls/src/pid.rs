//! Discrete PID controller.
//!
//! Three contribution paths (proportional, integral, derivative) that can be
//! switched on and off independently, plus two limits that are always active:
//! - the integral accumulator is clamped to `[-windup_limit, +windup_limit]`
//!   (anti-windup acts on the accumulator, not on output saturation)
//! - the output is clamped to `[output_min, output_max]`
//!
//! The derivative acts on the raw error without filtering, so a setpoint or
//! measurement step produces a derivative kick.
//!
//! Every gain, flag and limit has its own setter and takes effect on the next
//! `compute` call. A rejected update leaves the previous value in place.

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};
use crate::params::{ParamName, ParamValue, ParameterChange};

/// Initial controller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    pub setpoint: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub prop_enabled: bool,
    pub integ_enabled: bool,
    pub deriv_enabled: bool,
    #[serde(rename = "windup")]
    pub windup_limit: f64,
    pub output_min: f64,
    pub output_max: f64,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            setpoint: 25.0,
            kp: 1.0,
            ki: 0.1,
            kd: 0.0,
            prop_enabled: true,
            integ_enabled: true,
            deriv_enabled: true,
            windup_limit: 50.0,
            output_min: 0.0,
            output_max: 100.0,
        }
    }
}

impl PidConfig {
    /// Value of a single field, in the form the field device stores it.
    pub fn get(&self, name: ParamName) -> ParamValue {
        match name {
            ParamName::Setpoint => self.setpoint.into(),
            ParamName::Kp => self.kp.into(),
            ParamName::Ki => self.ki.into(),
            ParamName::Kd => self.kd.into(),
            ParamName::PropEnabled => self.prop_enabled.into(),
            ParamName::IntegEnabled => self.integ_enabled.into(),
            ParamName::DerivEnabled => self.deriv_enabled.into(),
            ParamName::WindupLimit => self.windup_limit.into(),
            ParamName::OutputMin => self.output_min.into(),
            ParamName::OutputMax => self.output_max.into(),
        }
    }

    /// Assign a single field after a type check.
    ///
    /// Cross-field ranges (`output_min <= output_max`) are checked when the
    /// config is turned into a controller, so fields can be filled in any order.
    pub fn set(&mut self, name: ParamName, value: &ParamValue) -> ControlResult<()> {
        match name {
            ParamName::Setpoint => self.setpoint = value.as_float(name)?,
            ParamName::Kp => self.kp = value.as_float(name)?,
            ParamName::Ki => self.ki = value.as_float(name)?,
            ParamName::Kd => self.kd = value.as_float(name)?,
            ParamName::PropEnabled => self.prop_enabled = value.as_bool(name)?,
            ParamName::IntegEnabled => self.integ_enabled = value.as_bool(name)?,
            ParamName::DerivEnabled => self.deriv_enabled = value.as_bool(name)?,
            ParamName::WindupLimit => self.windup_limit = value.as_float(name)?,
            ParamName::OutputMin => self.output_min = value.as_float(name)?,
            ParamName::OutputMax => self.output_max = value.as_float(name)?,
        }
        Ok(())
    }
}

/// PID controller settings plus the memory read by `compute`.
#[derive(Debug, Clone, PartialEq)]
pub struct PidController {
    config: PidConfig,
    /// Integral accumulator.
    integral: f64,
    /// Error seen by the previous `compute`; `None` until the first call.
    last_error: Option<f64>,
}

fn finite(value: f64, name: ParamName) -> ControlResult<f64> {
    ParamValue::Float(value).as_float(name)
}

impl PidController {
    /// Create a controller from initial settings.
    ///
    /// # Errors
    ///
    /// Returns error if any number is non-finite or `output_min > output_max`.
    pub fn new(config: PidConfig) -> ControlResult<Self> {
        let mut pid = Self {
            config: PidConfig::default(),
            integral: 0.0,
            last_error: None,
        };
        pid.set_setpoint(config.setpoint)?;
        pid.set_kp(config.kp)?;
        pid.set_ki(config.ki)?;
        pid.set_kd(config.kd)?;
        pid.set_prop_enabled(config.prop_enabled);
        pid.set_integ_enabled(config.integ_enabled);
        pid.set_deriv_enabled(config.deriv_enabled);
        pid.set_windup_limit(config.windup_limit)?;
        pid.set_output_limits(config.output_min, config.output_max)?;
        Ok(pid)
    }

    /// Compute the next controller output.
    ///
    /// # Arguments
    ///
    /// * `measured` - Process variable (measured temperature)
    /// * `dt` - Time since last update (seconds), strictly positive
    pub fn compute(&mut self, measured: f64, dt: f64) -> ControlResult<f64> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ControlError::NonPositiveStep { dt });
        }
        if !measured.is_finite() {
            return Err(ControlError::InvalidArg {
                what: "measurement must be finite",
            });
        }
        let cfg = &self.config;

        // Positive error means the measurement is below setpoint.
        let error = cfg.setpoint - measured;

        let p_term = if cfg.prop_enabled { cfg.kp * error } else { 0.0 };

        let i_term = if cfg.integ_enabled {
            let limit = cfg.windup_limit;
            self.integral = (self.integral + error * dt).clamp(-limit, limit);
            cfg.ki * self.integral
        } else {
            0.0
        };

        let d_term = match self.last_error {
            Some(last) if cfg.deriv_enabled => cfg.kd * (error - last) / dt,
            _ => 0.0,
        };

        self.last_error = Some(error);

        // Terms saturated to opposite infinities sum to NaN, which `clamp`
        // passes through. Such an output falls back to the lower limit.
        let output = p_term + i_term + d_term;
        let output = if output.is_nan() { cfg.output_min } else { output };
        Ok(output.clamp(cfg.output_min, cfg.output_max))
    }

    /// Clear the integral accumulator and the last-error memory.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = None;
    }

    pub fn config(&self) -> &PidConfig {
        &self.config
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn last_error(&self) -> Option<f64> {
        self.last_error
    }

    pub fn setpoint(&self) -> f64 {
        self.config.setpoint
    }

    pub fn set_setpoint(&mut self, setpoint: f64) -> ControlResult<()> {
        self.config.setpoint = finite(setpoint, ParamName::Setpoint)?;
        Ok(())
    }

    pub fn set_kp(&mut self, kp: f64) -> ControlResult<()> {
        self.config.kp = finite(kp, ParamName::Kp)?;
        Ok(())
    }

    pub fn set_ki(&mut self, ki: f64) -> ControlResult<()> {
        self.config.ki = finite(ki, ParamName::Ki)?;
        Ok(())
    }

    pub fn set_kd(&mut self, kd: f64) -> ControlResult<()> {
        self.config.kd = finite(kd, ParamName::Kd)?;
        Ok(())
    }

    pub fn set_prop_enabled(&mut self, enabled: bool) {
        self.config.prop_enabled = enabled;
    }

    /// Disabling the integral path freezes the accumulator; it is not cleared.
    pub fn set_integ_enabled(&mut self, enabled: bool) {
        self.config.integ_enabled = enabled;
    }

    pub fn set_deriv_enabled(&mut self, enabled: bool) {
        self.config.deriv_enabled = enabled;
    }

    /// Store `|limit|` as the accumulator bound.
    ///
    /// The current accumulator is left as is; the next integrating `compute`
    /// clamps it into the new bound.
    pub fn set_windup_limit(&mut self, limit: f64) -> ControlResult<()> {
        self.config.windup_limit = finite(limit, ParamName::WindupLimit)?.abs();
        Ok(())
    }

    pub fn set_output_limits(&mut self, output_min: f64, output_max: f64) -> ControlResult<()> {
        let output_min = finite(output_min, ParamName::OutputMin)?;
        let output_max = finite(output_max, ParamName::OutputMax)?;
        if output_min > output_max {
            return Err(ControlError::InvalidArg {
                what: "output_min must not exceed output_max",
            });
        }
        self.config.output_min = output_min;
        self.config.output_max = output_max;
        Ok(())
    }

    pub fn set_output_min(&mut self, output_min: f64) -> ControlResult<()> {
        let output_min = finite(output_min, ParamName::OutputMin)?;
        if output_min > self.config.output_max {
            return Err(ControlError::MalformedValue {
                name: ParamName::OutputMin,
                reason: format!(
                    "output_min {output_min} exceeds output_max {}",
                    self.config.output_max
                ),
            });
        }
        self.config.output_min = output_min;
        Ok(())
    }

    pub fn set_output_max(&mut self, output_max: f64) -> ControlResult<()> {
        let output_max = finite(output_max, ParamName::OutputMax)?;
        if output_max < self.config.output_min {
            return Err(ControlError::MalformedValue {
                name: ParamName::OutputMax,
                reason: format!(
                    "output_max {output_max} is below output_min {}",
                    self.config.output_min
                ),
            });
        }
        self.config.output_max = output_max;
        Ok(())
    }

    /// Apply one externally delivered field update.
    ///
    /// Only the named field changes. On error nothing changes.
    pub fn apply(&mut self, change: &ParameterChange) -> ControlResult<()> {
        let name = change.name;
        let value = &change.value;
        match name {
            ParamName::Setpoint => self.set_setpoint(value.as_float(name)?),
            ParamName::Kp => self.set_kp(value.as_float(name)?),
            ParamName::Ki => self.set_ki(value.as_float(name)?),
            ParamName::Kd => self.set_kd(value.as_float(name)?),
            ParamName::PropEnabled => {
                self.set_prop_enabled(value.as_bool(name)?);
                Ok(())
            }
            ParamName::IntegEnabled => {
                self.set_integ_enabled(value.as_bool(name)?);
                Ok(())
            }
            ParamName::DerivEnabled => {
                self.set_deriv_enabled(value.as_bool(name)?);
                Ok(())
            }
            ParamName::WindupLimit => self.set_windup_limit(value.as_float(name)?),
            ParamName::OutputMin => self.set_output_min(value.as_float(name)?),
            ParamName::OutputMax => self.set_output_max(value.as_float(name)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p_only(kp: f64) -> PidController {
        PidController::new(PidConfig {
            setpoint: 10.0,
            kp,
            ki: 0.0,
            kd: 0.0,
            prop_enabled: true,
            integ_enabled: false,
            deriv_enabled: false,
            windup_limit: 50.0,
            output_min: -1000.0,
            output_max: 1000.0,
        })
        .unwrap()
    }

    #[test]
    fn defaults_match_field_device_seed_values() {
        let cfg = PidConfig::default();
        assert_eq!(cfg.setpoint, 25.0);
        assert_eq!(cfg.windup_limit, 50.0);
        assert_eq!((cfg.output_min, cfg.output_max), (0.0, 100.0));
        assert_eq!(cfg.get(ParamName::Ki), ParamValue::Float(0.1));
        assert_eq!(cfg.get(ParamName::DerivEnabled), ParamValue::Bool(true));
    }

    #[test]
    fn proportional_only() {
        let mut pid = p_only(2.0);
        let out = pid.compute(7.0, 0.1).unwrap();
        assert!((out - 6.0).abs() < 1e-12);
    }

    #[test]
    fn integral_accumulates_error_times_dt() {
        let mut pid = p_only(0.0);
        pid.set_integ_enabled(true);
        pid.set_ki(0.5).unwrap();
        for _ in 0..4 {
            pid.compute(8.0, 0.5).unwrap();
        }
        // 4 * (2.0 * 0.5)
        assert!((pid.integral() - 4.0).abs() < 1e-12);
        let out = pid.compute(8.0, 0.5).unwrap();
        assert!((out - 0.5 * 5.0).abs() < 1e-12);
    }

    #[test]
    fn integral_clamped_to_windup_limit() {
        let mut pid = p_only(0.0);
        pid.set_integ_enabled(true);
        pid.set_ki(1.0).unwrap();
        pid.set_windup_limit(-3.0).unwrap();
        assert_eq!(pid.config().windup_limit, 3.0);
        for _ in 0..100 {
            pid.compute(0.0, 1.0).unwrap();
        }
        assert_eq!(pid.integral(), 3.0);
        for _ in 0..100 {
            pid.compute(100.0, 1.0).unwrap();
        }
        assert_eq!(pid.integral(), -3.0);
    }

    #[test]
    fn disabled_integral_is_frozen_not_reset() {
        let mut pid = p_only(0.0);
        pid.set_integ_enabled(true);
        pid.set_ki(1.0).unwrap();
        pid.compute(9.0, 1.0).unwrap();
        assert_eq!(pid.integral(), 1.0);

        pid.set_integ_enabled(false);
        let out = pid.compute(0.0, 1.0).unwrap();
        assert_eq!(pid.integral(), 1.0);
        assert_eq!(out, 0.0);
    }

    #[test]
    fn first_compute_has_no_derivative() {
        let mut pid = p_only(0.0);
        pid.set_deriv_enabled(true);
        pid.set_kd(10.0).unwrap();
        assert_eq!(pid.compute(0.0, 0.1).unwrap(), 0.0);
        // Error drops from 10 to 9: D = 10 * (9 - 10) / 0.1
        let out = pid.compute(1.0, 0.1).unwrap();
        assert!((out + 100.0).abs() < 1e-9);
    }

    #[test]
    fn last_error_tracked_while_derivative_disabled() {
        let mut pid = p_only(0.0);
        pid.set_kd(1.0).unwrap();
        pid.compute(4.0, 1.0).unwrap();
        assert_eq!(pid.last_error(), Some(6.0));

        // Enabling the derivative later uses the error remembered meanwhile.
        pid.set_deriv_enabled(true);
        let out = pid.compute(5.0, 1.0).unwrap();
        assert!((out + 1.0).abs() < 1e-12);
    }

    #[test]
    fn setpoint_step_kicks_derivative() {
        let mut pid = p_only(0.0);
        pid.set_deriv_enabled(true);
        pid.set_kd(1.0).unwrap();
        pid.compute(10.0, 0.1).unwrap();
        pid.set_setpoint(20.0).unwrap();
        let out = pid.compute(10.0, 0.1).unwrap();
        assert!((out - 100.0).abs() < 1e-9);
    }

    #[test]
    fn reset_clears_integral_and_last_error_only() {
        let mut pid = p_only(1.5);
        pid.set_integ_enabled(true);
        pid.compute(0.0, 1.0).unwrap();
        let cfg_before = pid.config().clone();
        assert!(pid.integral() != 0.0);
        assert!(pid.last_error().is_some());

        pid.reset();
        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.last_error(), None);
        assert_eq!(pid.config(), &cfg_before);
    }

    #[test]
    fn output_saturates() {
        let mut pid = p_only(100.0);
        pid.set_output_limits(0.0, 5.0).unwrap();
        assert_eq!(pid.compute(0.0, 0.1).unwrap(), 5.0);
        assert_eq!(pid.compute(50.0, 0.1).unwrap(), 0.0);
    }

    #[test]
    fn rejects_bad_step_and_measurement() {
        let mut pid = p_only(1.0);
        assert_eq!(
            pid.compute(1.0, 0.0),
            Err(ControlError::NonPositiveStep { dt: 0.0 })
        );
        assert!(pid.compute(1.0, -0.1).is_err());
        assert!(pid.compute(f64::NAN, 0.1).is_err());
        assert_eq!(pid.last_error(), None);
    }

    #[test]
    fn opposite_saturated_terms_fall_back_to_output_min() {
        let mut pid = PidController::new(PidConfig {
            kp: 1e300,
            ki: 0.0,
            kd: -1e300,
            ..PidConfig::default()
        })
        .unwrap();
        assert_eq!(pid.compute(0.0, 0.1).unwrap(), 100.0);
        // P overflows to +inf and D to -inf.
        let out = pid.compute(-1e10, 0.1).unwrap();
        assert_eq!(out, 0.0);
    }

    #[test]
    fn output_limit_updates_keep_min_below_max() {
        let mut pid = p_only(1.0);
        pid.set_output_limits(0.0, 100.0).unwrap();
        assert!(matches!(
            pid.set_output_min(150.0),
            Err(ControlError::MalformedValue { name: ParamName::OutputMin, .. })
        ));
        assert!(matches!(
            pid.set_output_max(-1.0),
            Err(ControlError::MalformedValue { name: ParamName::OutputMax, .. })
        ));
        assert!(matches!(
            pid.set_output_limits(10.0, 5.0),
            Err(ControlError::InvalidArg { .. })
        ));
        assert_eq!((pid.config().output_min, pid.config().output_max), (0.0, 100.0));
        pid.set_output_min(100.0).unwrap();
        assert_eq!(pid.config().output_min, 100.0);
    }

    #[test]
    fn apply_updates_single_field() {
        let mut pid = PidController::new(PidConfig::default()).unwrap();
        pid.apply(&ParameterChange::new(ParamName::Kp, 3_i64)).unwrap();
        pid.apply(&ParameterChange::new(ParamName::DerivEnabled, false)).unwrap();
        pid.apply(&ParameterChange::new(ParamName::WindupLimit, -7.5)).unwrap();

        let expected = PidConfig {
            kp: 3.0,
            deriv_enabled: false,
            windup_limit: 7.5,
            ..PidConfig::default()
        };
        assert_eq!(pid.config(), &expected);
    }

    #[test]
    fn apply_drops_malformed_values() {
        let mut pid = PidController::new(PidConfig::default()).unwrap();
        let before = pid.config().clone();
        let bad = [
            ParameterChange::new(ParamName::Setpoint, true),
            ParameterChange::new(ParamName::Kd, f64::INFINITY),
            ParameterChange::new(ParamName::IntegEnabled, 1.0),
            ParameterChange {
                name: ParamName::Ki,
                value: ParamValue::Text("fast".into()),
            },
            ParameterChange::new(ParamName::OutputMax, -5.0),
        ];
        for change in &bad {
            assert!(pid.apply(change).is_err(), "{change} should be rejected");
        }
        assert_eq!(pid.config(), &before);
    }

    #[test]
    fn config_set_checks_types_only() {
        let mut cfg = PidConfig::default();
        cfg.set(ParamName::OutputMin, &ParamValue::Float(150.0)).unwrap();
        cfg.set(ParamName::OutputMax, &ParamValue::Int(200)).unwrap();
        cfg.set(ParamName::PropEnabled, &ParamValue::Bool(false)).unwrap();
        assert!(cfg.set(ParamName::Kp, &ParamValue::Bool(true)).is_err());
        assert_eq!((cfg.output_min, cfg.output_max), (150.0, 200.0));
        assert!(!cfg.prop_enabled);
        assert!(PidController::new(cfg).is_ok());
    }

    #[test]
    fn new_validates_config() {
        let cfg = PidConfig {
            output_min: 10.0,
            output_max: 0.0,
            ..PidConfig::default()
        };
        assert!(PidController::new(cfg).is_err());
        let cfg = PidConfig {
            kp: f64::NAN,
            ..PidConfig::default()
        };
        assert!(PidController::new(cfg).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn controller(
        kp: f64,
        ki: f64,
        kd: f64,
        windup: f64,
        limits: (f64, f64),
        integ_enabled: bool,
    ) -> PidController {
        let (a, b) = limits;
        PidController::new(PidConfig {
            setpoint: 0.0,
            kp,
            ki,
            kd,
            prop_enabled: true,
            integ_enabled,
            deriv_enabled: true,
            windup_limit: windup,
            output_min: a.min(b),
            output_max: a.max(b),
        })
        .unwrap()
    }

    proptest! {
        #[test]
        fn integral_never_exceeds_windup_limit(
            windup in 0.0_f64..100.0,
            ki in -10.0_f64..10.0,
            steps in prop::collection::vec((-1e4_f64..1e4, 1e-3_f64..10.0), 1..60),
            setpoints in prop::collection::vec(-500.0_f64..500.0, 1..5),
        ) {
            let mut pid = controller(1.0, ki, 0.0, windup, (-10.0, 10.0), true);
            for (i, (measured, dt)) in steps.iter().enumerate() {
                pid.set_setpoint(setpoints[i % setpoints.len()]).unwrap();
                pid.compute(*measured, *dt).unwrap();
                prop_assert!(pid.integral().abs() <= windup);
            }
        }

        #[test]
        fn output_always_within_limits(
            kp in -1e3_f64..1e3,
            ki in -1e3_f64..1e3,
            kd in -1e3_f64..1e3,
            limits in (-1e3_f64..1e3, -1e3_f64..1e3),
            steps in prop::collection::vec((-1e5_f64..1e5, 1e-4_f64..5.0), 1..40),
        ) {
            let mut pid = controller(kp, ki, kd, 1e6, limits, true);
            let (lo, hi) = (limits.0.min(limits.1), limits.0.max(limits.1));
            for (measured, dt) in steps {
                let out = pid.compute(measured, dt).unwrap();
                prop_assert!(out >= lo && out <= hi, "output {out} outside [{lo}, {hi}]");
            }
        }

        #[test]
        fn output_within_limits_for_extreme_gains(
            kp in -1e300_f64..1e300,
            ki in -1e300_f64..1e300,
            kd in -1e300_f64..1e300,
            limits in (-1e3_f64..1e3, -1e3_f64..1e3),
            steps in prop::collection::vec((-1e300_f64..1e300, 1e-4_f64..5.0), 1..40),
        ) {
            let mut pid = controller(kp, ki, kd, 1e300, limits, true);
            let (lo, hi) = (limits.0.min(limits.1), limits.0.max(limits.1));
            for (measured, dt) in steps {
                let out = pid.compute(measured, dt).unwrap();
                prop_assert!(out >= lo && out <= hi, "output {out} outside [{lo}, {hi}]");
            }
        }

        #[test]
        fn disabled_integral_leaves_accumulator_unchanged(
            warmup in prop::collection::vec(-100.0_f64..100.0, 0..10),
            steps in prop::collection::vec((-1e4_f64..1e4, 1e-3_f64..10.0), 1..60),
        ) {
            let mut pid = controller(1.0, 1.0, 1.0, 1e3, (-1e3, 1e3), true);
            for measured in warmup {
                pid.compute(measured, 0.1).unwrap();
            }
            pid.set_integ_enabled(false);
            let frozen = pid.integral();
            for (measured, dt) in steps {
                pid.compute(measured, dt).unwrap();
                prop_assert_eq!(pid.integral(), frozen);
            }
        }

        #[test]
        fn first_compute_after_reset_has_no_derivative(
            kd in -1e3_f64..1e3,
            history in prop::collection::vec(-100.0_f64..100.0, 0..10),
            measured in -100.0_f64..100.0,
            dt in 1e-3_f64..1.0,
        ) {
            let mut with_d = controller(1.0, 0.0, kd, 1e3, (-1e9, 1e9), false);
            for m in history {
                with_d.compute(m, 0.1).unwrap();
            }
            with_d.reset();
            let mut without_d = with_d.clone();
            without_d.set_deriv_enabled(false);
            prop_assert_eq!(
                with_d.compute(measured, dt).unwrap(),
                without_d.compute(measured, dt).unwrap()
            );
        }
    }
}
