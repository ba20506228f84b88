//! Startup sequence: tune, seed the field device, read back, build.
//!
//! Runs once before the control loop. Tuning failures and unreadable
//! parameters are fatal. A seed write the device refuses is only logged,
//! since the read-back that follows decides the controller's settings.

use vtc_controls::{
    ParamName, ParameterChange, PidConfig, PidController, TuningResult, tune_single_lag,
    tune_two_stage,
};
use vtc_sim::Plant;

use crate::config::{ControllerConfig, PlantConfig};
use crate::device::FieldDevice;
use crate::error::AppResult;

/// Everything startup decides before touching the field device.
#[derive(Debug, Clone)]
pub struct StartupPlan {
    pub plant: Plant,
    pub tuning: TuningResult,
    /// Parameter writes that seed the device with the tuned settings.
    pub seeds: Vec<ParameterChange>,
}

/// A plant and controller ready for the control loop.
#[derive(Debug, Clone)]
pub struct Startup {
    pub plant: Plant,
    pub controller: PidController,
    pub tuning: TuningResult,
}

/// Tune gains for the configured plant.
pub fn tune(config: &ControllerConfig) -> AppResult<TuningResult> {
    let tuning = match &config.plant {
        PlantConfig::Pt1 { tau, k } => tune_single_lag(*k, *tau, config.aggressiveness)?,
        PlantConfig::TwoPt1 {
            tau_p,
            k_p,
            tau_h,
            k_h,
        } => tune_two_stage(*k_h, *k_p, *tau_h, *tau_p, config.aggressiveness)?,
    };
    Ok(tuning)
}

/// Validate the config, tune, build the plant and list the seed writes.
///
/// Derivative action is seeded on only for the two-stage plant, whose tuning
/// produces a derivative gain.
pub fn plan(config: &ControllerConfig) -> AppResult<StartupPlan> {
    config.validate()?;
    let tuning = tune(config)?;
    let plant = config.build_plant()?;
    let derivative = matches!(config.plant, PlantConfig::TwoPt1 { .. });

    let seeds = vec![
        ParameterChange::new(ParamName::Kp, tuning.kp),
        ParameterChange::new(ParamName::Ki, tuning.ki),
        ParameterChange::new(ParamName::Kd, tuning.kd),
        ParameterChange::new(ParamName::PropEnabled, true),
        ParameterChange::new(ParamName::IntegEnabled, true),
        ParameterChange::new(ParamName::DerivEnabled, derivative),
    ];
    Ok(StartupPlan {
        plant,
        tuning,
        seeds,
    })
}

/// Run the full startup sequence against `device`.
pub async fn initialize<D>(config: &ControllerConfig, device: &D) -> AppResult<Startup>
where
    D: FieldDevice + ?Sized,
{
    let StartupPlan {
        plant,
        tuning,
        seeds,
    } = plan(config)?;
    tracing::info!(
        plant = ?plant.kind(),
        initial_temperature = config.initial_temperature,
        ambient_temperature = config.ambient_temperature,
        dt_sim = config.dt_sim,
        update_interval = config.update_interval,
        "plant configured"
    );
    tracing::info!(
        kp = tuning.kp,
        ki = tuning.ki,
        kd = tuning.kd,
        lambda = tuning.lambda,
        aggressiveness = config.aggressiveness,
        "controller tuned"
    );

    for seed in &seeds {
        if let Err(err) = device.write_parameter(seed).await {
            tracing::warn!(change = %seed, error = %err, "seed write failed; keeping device value");
        }
    }

    let mut settings = PidConfig::default();
    for name in ParamName::ALL {
        let value = device.read_initial(name).await?;
        settings.set(name, &value)?;
    }
    let controller = PidController::new(settings)?;
    tracing::info!(settings = ?controller.config(), "controller initialised from field device");

    Ok(Startup {
        plant,
        controller,
        tuning,
    })
}
