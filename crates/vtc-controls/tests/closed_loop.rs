//! Closed-loop checks: autotuned controllers driving the simulated plants.

use vtc_controls::{
    DEFAULT_AGGRESSIVENESS, ParamName, ParameterChange, PidConfig, PidController, tune_single_lag,
    tune_two_stage,
};
use vtc_sim::{Plant, ThermalPlant, TwoStageParams, TwoStagePlant};

fn run(plant: &mut Plant, pid: &mut PidController, dt: f64, seconds: f64) -> f64 {
    let mut output = 0.0;
    let steps = (seconds / dt).round() as usize;
    for _ in 0..steps {
        let temp = plant.update(output, dt).unwrap();
        output = pid.compute(temp, dt).unwrap();
    }
    plant.temperature()
}

#[test]
fn tuned_pi_settles_single_lag_plant_at_setpoint() {
    let gains = tune_single_lag(1.0, 10.0, DEFAULT_AGGRESSIVENESS).unwrap();
    let mut plant = Plant::Thermal(ThermalPlant::new(22.0, 20.0, 10.0, 1.0).unwrap());
    let mut pid = PidController::new(PidConfig {
        setpoint: 30.0,
        kp: gains.kp,
        ki: gains.ki,
        kd: gains.kd,
        deriv_enabled: false,
        // Holding 30 °C needs ki * integral = 10, beyond the default bound of 50.
        windup_limit: 1000.0,
        ..PidConfig::default()
    })
    .unwrap();

    let temp = run(&mut plant, &mut pid, 0.1, 200.0);
    assert!((temp - 30.0).abs() < 0.05, "settled at {temp}");
}

#[test]
fn tuned_pid_settles_two_stage_plant_at_setpoint() {
    let params = TwoStageParams::default();
    let gains = tune_two_stage(
        params.k_h,
        params.k_p,
        params.tau_h,
        params.tau_p,
        DEFAULT_AGGRESSIVENESS,
    )
    .unwrap();
    let mut plant = Plant::TwoStage(TwoStagePlant::new(22.0, 20.0, params).unwrap());
    let mut pid = PidController::new(PidConfig {
        setpoint: 40.0,
        kp: gains.kp,
        ki: gains.ki,
        kd: gains.kd,
        ..PidConfig::default()
    })
    .unwrap();

    // The raw derivative leaves the loop lightly damped; give it time to ring out.
    let temp = run(&mut plant, &mut pid, 0.1, 600.0);
    assert!((temp - 40.0).abs() < 0.05, "settled at {temp}");
}

#[test]
fn default_windup_limit_caps_integral_authority() {
    let gains = tune_single_lag(1.0, 10.0, DEFAULT_AGGRESSIVENESS).unwrap();
    let mut plant = Plant::Thermal(ThermalPlant::new(22.0, 20.0, 10.0, 1.0).unwrap());
    let mut pid = PidController::new(PidConfig {
        setpoint: 30.0,
        kp: gains.kp,
        ki: gains.ki,
        kd: 0.0,
        deriv_enabled: false,
        ..PidConfig::default()
    })
    .unwrap();

    // ki * 50 = 5 of integral action; the rest must come from a standing error.
    let temp = run(&mut plant, &mut pid, 0.1, 200.0);
    assert!((temp - 27.5).abs() < 0.01, "settled at {temp}");
    assert_eq!(pid.integral(), 50.0);
}

#[test]
fn live_setpoint_change_moves_the_plant() {
    let gains = tune_single_lag(1.0, 10.0, DEFAULT_AGGRESSIVENESS).unwrap();
    let mut plant = Plant::Thermal(ThermalPlant::new(20.0, 20.0, 10.0, 1.0).unwrap());
    let mut pid = PidController::new(PidConfig {
        setpoint: 25.0,
        kp: gains.kp,
        ki: gains.ki,
        kd: 0.0,
        deriv_enabled: false,
        windup_limit: 1000.0,
        ..PidConfig::default()
    })
    .unwrap();

    let first = run(&mut plant, &mut pid, 0.1, 150.0);
    assert!((first - 25.0).abs() < 0.1);

    pid.apply(&ParameterChange::new(ParamName::Setpoint, 35.0))
        .unwrap();
    let second = run(&mut plant, &mut pid, 0.1, 150.0);
    assert!((second - 35.0).abs() < 0.1, "settled at {second}");
}
