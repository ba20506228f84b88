//! Boundary to the external field device.
//!
//! The controller never talks to a concrete transport. It reads its initial
//! parameters, writes parameters and process state, receives parameter
//! changes and raises alarms through [`FieldDevice`]. Any transport that can
//! do those five things can host the controller.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use vtc_controls::{AlarmCondition, ParamName, ParamValue, ParameterChange};

use crate::error::AppResult;

/// Process-state fields published every update interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateName {
    CurrentTemperature,
    ControlOutput,
    LastUpdateTime,
}

impl StateName {
    pub const ALL: [StateName; 3] = [
        StateName::CurrentTemperature,
        StateName::ControlOutput,
        StateName::LastUpdateTime,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StateName::CurrentTemperature => "temperature",
            StateName::ControlOutput => "control_output",
            StateName::LastUpdateTime => "last_update",
        }
    }
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A published state value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Float(f64),
    Timestamp(DateTime<Utc>),
}

impl StateValue {
    pub fn as_float(&self) -> Option<f64> {
        match self {
            StateValue::Float(v) => Some(*v),
            StateValue::Timestamp(_) => None,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Float(v) => write!(f, "{v}"),
            StateValue::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

/// Operations the controller needs from its host.
#[async_trait]
pub trait FieldDevice: Send + Sync {
    /// Current stored value of a parameter.
    async fn read_initial(&self, name: ParamName) -> AppResult<ParamValue>;

    /// Store a parameter value. Does not echo back through subscriptions.
    async fn write_parameter(&self, change: &ParameterChange) -> AppResult<()>;

    /// Publish one process-state value.
    async fn write_state(&self, name: StateName, value: StateValue) -> AppResult<()>;

    /// Deliver future changes of `names` to the returned subscription.
    async fn subscribe_changes(&self, names: &[ParamName]) -> AppResult<Subscription>;

    /// Hand an alarm to the host.
    async fn trigger_alarm(&self, alarm: &AlarmCondition) -> AppResult<()>;
}

/// Stream of externally written parameter changes.
///
/// Dropping the subscription runs its release hook exactly once, so the host
/// stops delivering to it no matter how the controller exits.
pub struct Subscription {
    receiver: mpsc::Receiver<ParameterChange>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        receiver: mpsc::Receiver<ParameterChange>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            release: Some(Box::new(release)),
        }
    }

    /// Next change; `None` once the host has closed the channel.
    pub async fn recv(&mut self) -> Option<ParameterChange> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ParameterChange> {
        self.receiver.try_recv().ok()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("released", &self.release.is_none())
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
