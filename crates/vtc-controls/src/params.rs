//! Runtime-adjustable controller parameters.
//!
//! An external writer addresses controller fields by [`ParamName`] and sends
//! loosely typed [`ParamValue`]s. Coercion is strict: integers widen to
//! floats, everything else must match the field's type exactly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Controller fields that can be read at startup and changed while running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamName {
    Setpoint,
    Kp,
    Ki,
    Kd,
    PropEnabled,
    IntegEnabled,
    DerivEnabled,
    #[serde(rename = "windup")]
    WindupLimit,
    OutputMin,
    OutputMax,
}

impl ParamName {
    pub const ALL: [ParamName; 10] = [
        ParamName::Setpoint,
        ParamName::Kp,
        ParamName::Ki,
        ParamName::Kd,
        ParamName::PropEnabled,
        ParamName::IntegEnabled,
        ParamName::DerivEnabled,
        ParamName::WindupLimit,
        ParamName::OutputMin,
        ParamName::OutputMax,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ParamName::Setpoint => "setpoint",
            ParamName::Kp => "kp",
            ParamName::Ki => "ki",
            ParamName::Kd => "kd",
            ParamName::PropEnabled => "prop_enabled",
            ParamName::IntegEnabled => "integ_enabled",
            ParamName::DerivEnabled => "deriv_enabled",
            ParamName::WindupLimit => "windup",
            ParamName::OutputMin => "output_min",
            ParamName::OutputMax => "output_max",
        }
    }

    /// Whether the field holds an enable flag rather than a number.
    pub fn is_flag(self) -> bool {
        matches!(
            self,
            ParamName::PropEnabled | ParamName::IntegEnabled | ParamName::DerivEnabled
        )
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ParamName {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ParamName::ALL
            .into_iter()
            .find(|name| name.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ControlError::UnknownParameter(wanted.to_string()))
    }
}

/// A loosely typed value as delivered by the field device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Parse operator input: booleans, then integers, then floats, else text.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Ok(b) = text.parse::<bool>() {
            ParamValue::Bool(b)
        } else if let Ok(i) = text.parse::<i64>() {
            ParamValue::Int(i)
        } else if let Ok(f) = text.parse::<f64>() {
            ParamValue::Float(f)
        } else {
            ParamValue::Text(text.to_string())
        }
    }

    /// Numeric view; rejects flags, text and non-finite numbers.
    pub fn as_float(&self, name: ParamName) -> ControlResult<f64> {
        let value = match self {
            ParamValue::Float(v) => *v,
            ParamValue::Int(v) => *v as f64,
            other => {
                return Err(ControlError::MalformedValue {
                    name,
                    reason: format!("expected a number, got {other}"),
                });
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ControlError::MalformedValue {
                name,
                reason: format!("non-finite number {value}"),
            })
        }
    }

    pub fn as_bool(&self, name: ParamName) -> ControlResult<bool> {
        match self {
            ParamValue::Bool(b) => Ok(*b),
            other => Err(ControlError::MalformedValue {
                name,
                reason: format!("expected a boolean, got {other}"),
            }),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

/// One field update from the external parameter channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterChange {
    pub name: ParamName,
    pub value: ParamValue,
}

impl ParameterChange {
    pub fn new(name: ParamName, value: impl Into<ParamValue>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

impl fmt::Display for ParameterChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// `name=value`, e.g. `setpoint=40` or `deriv_enabled=false`.
impl FromStr for ParameterChange {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = s.split_once('=').ok_or(ControlError::InvalidArg {
            what: "parameter change must look like name=value",
        })?;
        Ok(Self {
            name: name.parse()?,
            value: ParamValue::parse(value),
        })
    }
}
