//! Offline simulation on simulated time.
//!
//! Runs the same fast tick, publish cadence and alarm rule as the live loop,
//! but synchronously and as fast as possible. Parameter changes can be
//! scheduled at simulated times. The publish period is rounded to a whole
//! number of fast ticks so sampling does not jitter with float error.

use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use vtc_controls::{DeadlineClock, OverTemperatureAlarm, ParameterChange, PidController};

use crate::config::{ControllerConfig, seconds_to_duration};
use crate::control_loop::ControlLoop;
use crate::error::{AppError, AppResult};
use crate::startup::{StartupPlan, plan};

/// A parameter change applied when simulated time reaches `at`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledChange {
    /// Simulated time (s).
    pub at: f64,
    pub change: ParameterChange,
}

/// `T:name=value`, e.g. `120:setpoint=40`.
impl FromStr for ScheduledChange {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (at, change) = s
            .split_once(':')
            .ok_or_else(|| AppError::Config(format!("expected T:name=value, got {s:?}")))?;
        let at: f64 = at
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("invalid change time {at:?}")))?;
        if !(at.is_finite() && at >= 0.0) {
            return Err(AppError::Config(format!("change time must be >= 0, got {at}")));
        }
        Ok(Self {
            at,
            change: change.parse()?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulateOptions {
    /// Simulated duration (s).
    pub duration: f64,
    pub changes: Vec<ScheduledChange>,
}

/// One published sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub t: f64,
    pub temperature: f64,
    pub control_output: f64,
    pub setpoint: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heater_output: Option<f64>,
    pub alarm: bool,
}

/// Upper bound on samples reserved up front; longer runs grow as they go.
const PREALLOCATED_SAMPLES: u64 = 1 << 16;

fn tick_index(seconds: f64, dt: f64) -> u64 {
    // Tolerate float error so 120 s at dt 0.1 lands on tick 1200.
    (seconds / dt - 1e-9).ceil().max(0.0) as u64
}

/// Run the loop for `options.duration` simulated seconds.
///
/// The controller starts from `config.defaults` with the tuned gains and
/// flags applied, as if the field device accepted every seed write.
pub fn simulate(config: &ControllerConfig, options: &SimulateOptions) -> AppResult<Vec<Sample>> {
    seconds_to_duration("duration", options.duration)?;
    let StartupPlan { plant, seeds, .. } = plan(config)?;
    let mut settings = config.defaults.clone();
    for seed in &seeds {
        settings.set(seed.name, &seed.value)?;
    }
    let controller = Arc::new(Mutex::new(PidController::new(settings)?));
    let dt = config.dt_sim;
    let mut control = ControlLoop::new(plant, Arc::clone(&controller), dt);
    let alarm = OverTemperatureAlarm::new(config.alarm_source.clone());

    let mut changes = options.changes.clone();
    changes.sort_by(|a, b| a.at.total_cmp(&b.at));
    let mut changes = changes
        .into_iter()
        .map(|c| (tick_index(c.at, dt), c.change))
        .peekable();

    let steps = tick_index(options.duration, dt);
    let publish_every = tick_index(config.update_interval, dt).max(1);
    let mut clock = DeadlineClock::new(publish_every, 0u64);
    let reserved = (steps / publish_every + 1).min(PREALLOCATED_SAMPLES);
    let mut samples = Vec::with_capacity(reserved as usize);

    for _ in 0..steps {
        while let Some((_, change)) = changes.next_if(|(due, _)| *due <= control.ticks()) {
            let result = controller.lock().apply(&change);
            match result {
                Ok(()) => tracing::info!(%change, t = control.ticks() as f64 * dt, "parameter updated"),
                Err(err) => tracing::warn!(%change, error = %err, "parameter change dropped"),
            }
        }

        let snapshot = control.tick()?;
        if clock.poll(snapshot.tick) {
            let condition = alarm.evaluate(snapshot.temperature, snapshot.setpoint);
            if condition.active {
                tracing::info!(t = snapshot.sim_time, temperature = snapshot.temperature, "OverTemperatureAlarm triggered");
            }
            samples.push(Sample {
                t: snapshot.sim_time,
                temperature: snapshot.temperature,
                control_output: snapshot.control_output,
                setpoint: snapshot.setpoint,
                heater_output: snapshot.heater_output,
                alarm: condition.active,
            });
        }
    }
    Ok(samples)
}

pub fn write_csv<W: Write>(samples: &[Sample], mut out: W) -> AppResult<()> {
    writeln!(out, "time_s,temperature,control_output,setpoint,heater_output,alarm")?;
    for s in samples {
        let heater = s.heater_output.map(|h| h.to_string()).unwrap_or_default();
        writeln!(
            out,
            "{},{},{},{},{},{}",
            s.t, s.temperature, s.control_output, s.setpoint, heater, s.alarm
        )?;
    }
    Ok(())
}

pub fn write_jsonl<W: Write>(samples: &[Sample], mut out: W) -> AppResult<()> {
    for s in samples {
        serde_json::to_writer(&mut out, s)?;
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use vtc_controls::ParamName;

    use super::*;

    #[test]
    fn scheduled_change_parses() {
        let c: ScheduledChange = "120:setpoint=40".parse().unwrap();
        assert_eq!(c.at, 120.0);
        assert_eq!(c.change, ParameterChange::new(ParamName::Setpoint, 40i64));

        assert!("setpoint=40".parse::<ScheduledChange>().is_err());
        assert!("-1:setpoint=40".parse::<ScheduledChange>().is_err());
        assert!("5:nope=1".parse::<ScheduledChange>().is_err());
    }

    #[test]
    fn tick_index_absorbs_float_error() {
        assert_eq!(tick_index(120.0, 0.1), 1200);
        assert_eq!(tick_index(1.0, 0.1), 10);
        assert_eq!(tick_index(0.0, 0.1), 0);
        assert_eq!(tick_index(0.05, 0.1), 1);
    }

    #[test]
    fn samples_follow_publish_cadence() {
        let config = ControllerConfig::default();
        let samples = simulate(
            &config,
            &SimulateOptions {
                duration: 10.0,
                changes: Vec::new(),
            },
        )
        .unwrap();
        assert_eq!(samples.len(), 10);
        assert!((samples[0].t - 0.1).abs() < 1e-9);
        assert!((samples[1].t - 1.1).abs() < 1e-9);
        assert!(samples.iter().all(|s| s.heater_output.is_some()));
    }

    #[test]
    fn rejects_non_positive_duration() {
        let config = ControllerConfig::default();
        assert!(simulate(&config, &SimulateOptions::default()).is_err());
    }

    #[test]
    fn rejects_duration_beyond_timer_range() {
        let config = ControllerConfig::default();
        let options = SimulateOptions {
            duration: 1e300,
            changes: Vec::new(),
        };
        assert!(matches!(simulate(&config, &options), Err(AppError::Config(_))));
    }

    #[test]
    fn csv_and_jsonl_output() {
        let samples = [Sample {
            t: 1.5,
            temperature: 30.25,
            control_output: 12.0,
            setpoint: 30.0,
            heater_output: None,
            alarm: false,
        }];
        let mut csv = Vec::new();
        write_csv(&samples, &mut csv).unwrap();
        let csv = String::from_utf8(csv).unwrap();
        assert_eq!(
            csv,
            "time_s,temperature,control_output,setpoint,heater_output,alarm\n1.5,30.25,12,30,,false\n"
        );

        let mut jsonl = Vec::new();
        write_jsonl(&samples, &mut jsonl).unwrap();
        let line: serde_json::Value = serde_json::from_slice(&jsonl).unwrap();
        assert_eq!(line["temperature"], 30.25);
        assert!(line.get("heater_output").is_none());
    }
}
