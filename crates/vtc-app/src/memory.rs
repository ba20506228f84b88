//! In-process field device.
//!
//! Holds parameters, published state and raised alarms in memory. Used by the
//! CLI `run` command (fed from stdin) and by tests, which can also make any
//! write path fail on demand.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use vtc_controls::{AlarmCondition, ParamName, ParamValue, ParameterChange, PidConfig};

use crate::device::{FieldDevice, StateName, StateValue, Subscription};
use crate::error::{AppError, AppResult};

const SUBSCRIPTION_CAPACITY: usize = 64;

#[derive(Debug)]
struct Subscriber {
    id: u64,
    names: Vec<ParamName>,
    sender: mpsc::Sender<ParameterChange>,
}

#[derive(Debug, Default)]
struct Inner {
    params: HashMap<ParamName, ParamValue>,
    state: HashMap<StateName, StateValue>,
    state_writes: u64,
    alarms: Vec<AlarmCondition>,
    subscribers: Vec<Subscriber>,
    fail_state_writes: bool,
    fail_alarms: bool,
    refuse_parameter_writes: bool,
}

/// Field device backed by shared memory. Clones share the same store.
#[derive(Debug, Clone)]
pub struct MemoryDevice {
    inner: Arc<Mutex<Inner>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryDevice {
    /// A device whose stored parameters start at `defaults`.
    pub fn new(defaults: &PidConfig) -> Self {
        let params = ParamName::ALL
            .into_iter()
            .map(|name| (name, defaults.get(name)))
            .collect();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                params,
                ..Inner::default()
            })),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// External write: store the value and notify subscribers of that name.
    ///
    /// Returns how many subscriptions received the change. A full or closed
    /// subscription misses the change rather than blocking the writer.
    pub fn inject(&self, change: ParameterChange) -> usize {
        let mut inner = self.inner.lock();
        inner.params.insert(change.name, change.value.clone());
        let mut delivered = 0;
        for sub in inner.subscribers.iter().filter(|s| s.names.contains(&change.name)) {
            match sub.sender.try_send(change.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    tracing::warn!(subscriber = sub.id, %change, error = %err, "change not delivered");
                }
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    pub fn param(&self, name: ParamName) -> Option<ParamValue> {
        self.inner.lock().params.get(&name).cloned()
    }

    /// Overwrite a stored parameter without notifying anyone.
    pub fn store_param(&self, name: ParamName, value: impl Into<ParamValue>) {
        self.inner.lock().params.insert(name, value.into());
    }

    /// Remove a stored parameter so that reading it fails.
    pub fn remove_param(&self, name: ParamName) {
        self.inner.lock().params.remove(&name);
    }

    pub fn state(&self, name: StateName) -> Option<StateValue> {
        self.inner.lock().state.get(&name).cloned()
    }

    /// Number of successful state writes so far.
    pub fn state_writes(&self) -> u64 {
        self.inner.lock().state_writes
    }

    pub fn alarms(&self) -> Vec<AlarmCondition> {
        self.inner.lock().alarms.clone()
    }

    pub fn set_fail_state_writes(&self, fail: bool) {
        self.inner.lock().fail_state_writes = fail;
    }

    pub fn set_fail_alarms(&self, fail: bool) {
        self.inner.lock().fail_alarms = fail;
    }

    pub fn set_refuse_parameter_writes(&self, refuse: bool) {
        self.inner.lock().refuse_parameter_writes = refuse;
    }
}

#[async_trait]
impl FieldDevice for MemoryDevice {
    async fn read_initial(&self, name: ParamName) -> AppResult<ParamValue> {
        self.param(name)
            .ok_or_else(|| AppError::device("read_initial", format!("no value stored for {name}")))
    }

    async fn write_parameter(&self, change: &ParameterChange) -> AppResult<()> {
        let mut inner = self.inner.lock();
        if inner.refuse_parameter_writes {
            return Err(AppError::device(
                "write_parameter",
                format!("write of {change} refused"),
            ));
        }
        inner.params.insert(change.name, change.value.clone());
        Ok(())
    }

    async fn write_state(&self, name: StateName, value: StateValue) -> AppResult<()> {
        let mut inner = self.inner.lock();
        if inner.fail_state_writes {
            return Err(AppError::device("write_state", format!("{name} unavailable")));
        }
        inner.state.insert(name, value);
        inner.state_writes += 1;
        Ok(())
    }

    async fn subscribe_changes(&self, names: &[ParamName]) -> AppResult<Subscription> {
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().subscribers.push(Subscriber {
            id,
            names: names.to_vec(),
            sender,
        });
        tracing::debug!(subscriber = id, count = names.len(), "subscription opened");

        let inner = Arc::clone(&self.inner);
        Ok(Subscription::new(receiver, move || {
            inner.lock().subscribers.retain(|s| s.id != id);
            tracing::debug!(subscriber = id, "subscription released");
        }))
    }

    async fn trigger_alarm(&self, alarm: &AlarmCondition) -> AppResult<()> {
        let mut inner = self.inner.lock();
        if inner.fail_alarms {
            return Err(AppError::device("trigger_alarm", "alarm sink unavailable"));
        }
        inner.alarms.push(alarm.clone());
        Ok(())
    }
}
