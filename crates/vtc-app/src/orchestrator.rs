//! Live control loop against a field device.
//!
//! Three tasks share one controller:
//! - fast tick: plant update and compute every `dt_sim`, never awaits I/O
//! - publish: every `update_interval`, writes process state and evaluates
//!   the over-temperature alarm
//! - parameter channel: applies externally written changes as they arrive
//!
//! The fast tick hands its latest [`LoopSnapshot`] to the publish task over a
//! watch channel, so a slow field device delays publishing but never the
//! plant. Publish and alarm failures are logged and counted; errors from the
//! fast tick stop the whole run.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{self, Instant, MissedTickBehavior};
use vtc_controls::{DeadlineClock, OverTemperatureAlarm, ParamName, PidConfig, TuningResult};
use vtc_core::LoopTimings;

use crate::config::ControllerConfig;
use crate::control_loop::{ControlLoop, LoopSnapshot, SharedController};
use crate::device::{FieldDevice, StateName, StateValue, Subscription};
use crate::error::{AppError, AppResult};
use crate::startup::initialize;

/// What a finished run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub publishes: u64,
    pub publish_failures: u64,
    pub alarms: u64,
    pub applied_changes: u64,
    pub dropped_changes: u64,
    pub final_snapshot: LoopSnapshot,
    /// Controller settings at shutdown, including live changes.
    pub controller: PidConfig,
    pub tuning: TuningResult,
}

/// Start up against `device` and run until `shutdown` completes.
///
/// Returns early with the error if startup fails or any task fails. Every
/// task is stopped and the change subscription released before returning.
pub async fn run_controller<D, F>(
    config: &ControllerConfig,
    device: Arc<D>,
    shutdown: F,
) -> AppResult<RunSummary>
where
    D: FieldDevice + 'static,
    F: Future<Output = ()>,
{
    let startup = initialize(config, device.as_ref()).await?;
    let tick_period = config.tick_period()?;
    let publish_period = config.publish_period()?;
    let tuning = startup.tuning;
    let controller: SharedController = Arc::new(Mutex::new(startup.controller));
    let control = ControlLoop::new(startup.plant, Arc::clone(&controller), config.dt_sim);
    let subscription = device.subscribe_changes(&ParamName::ALL).await?;

    let timings = Arc::new(LoopTimings::default());
    let (snapshot_tx, snapshot_rx) = watch::channel(control.snapshot());
    let alarm = OverTemperatureAlarm::new(config.alarm_source.clone());

    let mut tasks: JoinSet<(&'static str, AppResult<()>)> = JoinSet::new();
    tasks.spawn(named(
        "fast tick",
        tick_loop(control, tick_period, snapshot_tx, Arc::clone(&timings)),
    ));
    tasks.spawn(named(
        "publish",
        publish_loop(
            Arc::clone(&device),
            snapshot_rx.clone(),
            publish_period,
            alarm,
            Arc::clone(&timings),
        ),
    ));
    tasks.spawn(named(
        "parameter channel",
        parameter_loop(subscription, Arc::clone(&controller), Arc::clone(&timings)),
    ));
    tracing::info!(
        dt_sim = config.dt_sim,
        update_interval = config.update_interval,
        "control loop started"
    );

    let outcome = tokio::select! {
        () = shutdown => {
            tracing::info!("shutdown requested");
            Ok(())
        }
        Some(joined) = tasks.join_next() => match joined {
            Ok((task, Ok(()))) => Err(AppError::Task(format!("{task} task stopped unexpectedly"))),
            Ok((task, Err(err))) => {
                tracing::error!(task, error = %err, "task failed");
                Err(err)
            }
            Err(err) => Err(AppError::Task(err.to_string())),
        },
    };
    // Aborting the parameter task drops the subscription.
    tasks.shutdown().await;

    let final_snapshot = *snapshot_rx.borrow();
    let summary = RunSummary {
        ticks: timings.tick.count(),
        publishes: timings.publish.count(),
        publish_failures: timings.publish_failures(),
        alarms: timings.alarms_raised(),
        applied_changes: timings.applied_changes(),
        dropped_changes: timings.dropped_changes(),
        final_snapshot,
        controller: controller.lock().config().clone(),
        tuning,
    };
    log_summary(&summary, &timings);
    outcome.map(|()| summary)
}

async fn named<F>(task: &'static str, fut: F) -> (&'static str, AppResult<()>)
where
    F: Future<Output = AppResult<()>>,
{
    (task, fut.await)
}

async fn tick_loop(
    mut control: ControlLoop,
    period: Duration,
    snapshots: watch::Sender<LoopSnapshot>,
    timings: Arc<LoopTimings>,
) -> AppResult<()> {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let started = Instant::now();
        let snapshot = control.tick()?;
        timings.tick.record(started.elapsed());
        snapshots.send_replace(snapshot);
    }
}

async fn publish_loop<D>(
    device: Arc<D>,
    mut snapshots: watch::Receiver<LoopSnapshot>,
    period: Duration,
    alarm: OverTemperatureAlarm,
    timings: Arc<LoopTimings>,
) -> AppResult<()>
where
    D: FieldDevice + ?Sized,
{
    // Nothing to publish before the first tick.
    if snapshots.changed().await.is_err() {
        return Ok(());
    }
    let mut clock = DeadlineClock::new(period, Instant::now());
    loop {
        time::sleep_until(clock.next_deadline()).await;
        let now = Instant::now();
        clock.fire(now);

        let snapshot = *snapshots.borrow_and_update();
        publish(device.as_ref(), &snapshot, &alarm, &timings).await;
        timings.publish.record(now.elapsed());
    }
}

async fn publish<D>(
    device: &D,
    snapshot: &LoopSnapshot,
    alarm: &OverTemperatureAlarm,
    timings: &LoopTimings,
) where
    D: FieldDevice + ?Sized,
{
    let mut failed = false;
    let states = [
        (StateName::CurrentTemperature, StateValue::Float(snapshot.temperature)),
        (StateName::ControlOutput, StateValue::Float(snapshot.control_output)),
        (StateName::LastUpdateTime, StateValue::Timestamp(Utc::now())),
    ];
    for (name, value) in states {
        if let Err(err) = device.write_state(name, value).await {
            tracing::warn!(state = %name, error = %err, "state write failed");
            failed = true;
        }
    }

    let condition = alarm.evaluate(snapshot.temperature, snapshot.setpoint);
    if condition.active {
        match device.trigger_alarm(&condition).await {
            Ok(()) => {
                timings.record_alarm();
                tracing::info!(
                    temperature = snapshot.temperature,
                    setpoint = snapshot.setpoint,
                    severity = condition.severity,
                    "OverTemperatureAlarm triggered"
                );
            }
            Err(err) => {
                tracing::warn!(error = %err, "alarm delivery failed");
                failed = true;
            }
        }
    }

    if failed {
        timings.record_publish_failure();
    }
    tracing::debug!(
        tick = snapshot.tick,
        temperature = snapshot.temperature,
        control_output = snapshot.control_output,
        "published"
    );
}

async fn parameter_loop(
    mut subscription: Subscription,
    controller: SharedController,
    timings: Arc<LoopTimings>,
) -> AppResult<()> {
    while let Some(change) = subscription.recv().await {
        let result = controller.lock().apply(&change);
        match result {
            Ok(()) => {
                timings.record_applied_change();
                tracing::info!(%change, "parameter updated");
            }
            Err(err) => {
                timings.record_dropped_change();
                tracing::warn!(%change, error = %err, "parameter change dropped");
            }
        }
    }
    // The host closed the channel; keep controlling with the current settings.
    tracing::warn!("parameter channel closed by field device");
    drop(subscription);
    std::future::pending::<()>().await;
    Ok(())
}

fn log_summary(summary: &RunSummary, timings: &LoopTimings) {
    tracing::info!(
        ticks = summary.ticks,
        tick_avg_us = timings.tick.average_seconds() * 1e6,
        tick_max_us = timings.tick.max_seconds() * 1e6,
        publishes = summary.publishes,
        publish_avg_ms = timings.publish.average_seconds() * 1e3,
        publish_max_ms = timings.publish.max_seconds() * 1e3,
        publish_failures = summary.publish_failures,
        alarms = summary.alarms,
        applied_changes = summary.applied_changes,
        dropped_changes = summary.dropped_changes,
        final_temperature = summary.final_snapshot.temperature,
        "control loop stopped"
    );
}
