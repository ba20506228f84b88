//! Integration tests: plant models driven through the shared `Plant` contract.

use vtc_sim::{FirstOrderLag, Plant, SimError, ThermalPlant, TwoStageParams, TwoStagePlant};

#[test]
fn generic_lag_reference_step() {
    let mut plant = Plant::FirstOrder(FirstOrderLag::new(1.0, 10.0, 0.0).unwrap());
    let x = plant.update(1.0, 1.0).unwrap();
    assert!((x - 0.1).abs() < 1e-12);
}

#[test]
fn ambient_plant_reference_step() {
    let mut plant = Plant::Thermal(ThermalPlant::new(22.0, 20.0, 10.0, 1.0).unwrap());
    let temp = plant.update(0.0, 1.0).unwrap();
    assert!((temp - 21.8).abs() < 1e-9);
    assert_eq!(plant.state().ambient, 20.0);
}

#[test]
fn zero_input_relaxes_to_ambient_for_every_thermal_variant() {
    let mut plants = [
        Plant::Thermal(ThermalPlant::new(60.0, 20.0, 10.0, 1.0).unwrap()),
        Plant::TwoStage(TwoStagePlant::new(60.0, 20.0, TwoStageParams::default()).unwrap()),
    ];
    for plant in plants.iter_mut() {
        let mut last = plant.temperature();
        for _ in 0..3000 {
            let temp = plant.update(0.0, 0.1).unwrap();
            assert!(temp <= last + 1e-12, "temperature must not rise without input");
            last = temp;
        }
        assert!((last - 20.0).abs() < 1e-3);
    }
}

#[test]
fn two_stage_heater_lags_the_plant_response() {
    let mut plant = TwoStagePlant::new(20.0, 20.0, TwoStageParams::default()).unwrap();
    // One heater time constant in, the heater is well below its 100 W target
    // and the plant has moved only a couple of degrees.
    for _ in 0..10 {
        plant.update(1.0, 0.1).unwrap();
    }
    assert!(plant.heater_output() > 60.0 && plant.heater_output() < 70.0);
    assert!(plant.temperature() > 20.0 && plant.temperature() < 23.0);
}

#[test]
fn non_positive_step_is_an_error_for_every_variant() {
    let mut plants = [
        Plant::FirstOrder(FirstOrderLag::new(1.0, 10.0, 0.0).unwrap()),
        Plant::Thermal(ThermalPlant::new(22.0, 20.0, 10.0, 1.0).unwrap()),
        Plant::TwoStage(TwoStagePlant::new(22.0, 20.0, TwoStageParams::default()).unwrap()),
    ];
    for plant in plants.iter_mut() {
        assert_eq!(plant.update(1.0, 0.0), Err(SimError::NonPositiveStep { dt: 0.0 }));
        assert!(matches!(
            plant.update(1.0, -1.0),
            Err(SimError::NonPositiveStep { .. })
        ));
    }
}
