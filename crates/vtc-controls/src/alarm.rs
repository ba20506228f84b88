//! Alarm conditions raised toward the field device.

use serde::{Deserialize, Serialize};

/// Temperature above `setpoint + margin` raises the over-temperature alarm.
pub const OVER_TEMPERATURE_MARGIN: f64 = 5.0;
pub const OVER_TEMPERATURE_SEVERITY: u16 = 900;
pub const DEFAULT_ALARM_SOURCE: &str = "TemperatureController";

/// An alarm as delivered to the field device.
///
/// `active` is recomputed at every evaluation; nothing carries over between
/// publish ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmCondition {
    pub severity: u16,
    pub message: String,
    pub source: String,
    pub active: bool,
}

/// Level-triggered over-temperature check.
///
/// Every evaluation with `temperature > setpoint + margin` yields an active
/// condition; there is no latching or edge detection.
#[derive(Debug, Clone, PartialEq)]
pub struct OverTemperatureAlarm {
    margin: f64,
    severity: u16,
    source: String,
}

impl Default for OverTemperatureAlarm {
    fn default() -> Self {
        Self::new(DEFAULT_ALARM_SOURCE)
    }
}

impl OverTemperatureAlarm {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            margin: OVER_TEMPERATURE_MARGIN,
            severity: OVER_TEMPERATURE_SEVERITY,
            source: source.into(),
        }
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn evaluate(&self, temperature: f64, setpoint: f64) -> AlarmCondition {
        let threshold = setpoint + self.margin;
        let active = temperature > threshold;
        let message = if active {
            format!("Over temperature: {temperature:.2} °C exceeds {threshold:.2} °C")
        } else {
            format!("Temperature {temperature:.2} °C within limit {threshold:.2} °C")
        };
        AlarmCondition {
            severity: self.severity,
            message,
            source: self.source.clone(),
            active,
        }
    }
}
