//! Startup sequence against the in-memory field device.

use vtc_app::{AppError, ControllerConfig, MemoryDevice, PlantConfig, PlantType, initialize};
use vtc_controls::{ParamName, ParamValue};

#[tokio::test]
async fn seeds_tuned_gains_and_reads_them_back() {
    let config = ControllerConfig::default();
    let device = MemoryDevice::new(&config.defaults);

    let startup = initialize(&config, &device).await.unwrap();

    // two_pt1 defaults: K = 50, T = 11, lambda = 11
    let settings = startup.controller.config();
    assert!((settings.kp - 0.02).abs() < 1e-12);
    assert!((settings.ki - 1.0 / 11.0).abs() < 1e-12);
    assert!((settings.kd - 10.0 / 11.0).abs() < 1e-12);
    assert!(settings.deriv_enabled);
    assert_eq!(settings.setpoint, 25.0);
    assert_eq!(device.param(ParamName::Kp), Some(ParamValue::Float(settings.kp)));
    assert_eq!(startup.plant.temperature(), 22.0);
}

#[tokio::test]
async fn single_lag_seeds_derivative_off() {
    let config = ControllerConfig {
        plant: PlantConfig::defaults_for(PlantType::Pt1),
        ..ControllerConfig::default()
    };
    let device = MemoryDevice::new(&config.defaults);
    let startup = initialize(&config, &device).await.unwrap();

    let settings = startup.controller.config();
    assert!((settings.kp - 1.0).abs() < 1e-12);
    assert!((settings.ki - 0.1).abs() < 1e-12);
    assert_eq!(settings.kd, 0.0);
    assert!(!settings.deriv_enabled);
    assert_eq!(device.param(ParamName::DerivEnabled), Some(ParamValue::Bool(false)));
}

#[tokio::test]
async fn device_values_win_when_seed_writes_are_refused() {
    let config = ControllerConfig::default();
    let device = MemoryDevice::new(&config.defaults);
    device.set_refuse_parameter_writes(true);
    device.store_param(ParamName::Setpoint, 45i64);

    let startup = initialize(&config, &device).await.unwrap();
    let settings = startup.controller.config();
    assert_eq!(settings.kp, 1.0);
    assert_eq!(settings.ki, 0.1);
    assert_eq!(settings.setpoint, 45.0);
}

#[tokio::test]
async fn unreadable_or_malformed_parameter_is_fatal() {
    let config = ControllerConfig::default();

    let device = MemoryDevice::new(&config.defaults);
    device.remove_param(ParamName::OutputMax);
    let err = initialize(&config, &device).await.unwrap_err();
    assert!(matches!(err, AppError::Device { operation: "read_initial", .. }));

    let device = MemoryDevice::new(&config.defaults);
    device.store_param(ParamName::WindupLimit, ParamValue::Text("lots".into()));
    assert!(matches!(
        initialize(&config, &device).await,
        Err(AppError::Control(_))
    ));
}

#[tokio::test]
async fn non_physical_plant_stops_startup() {
    let config = ControllerConfig {
        plant: PlantConfig::TwoPt1 {
            tau_p: 10.0,
            k_p: 0.5,
            tau_h: 1.0,
            k_h: -100.0,
        },
        ..ControllerConfig::default()
    };
    let device = MemoryDevice::new(&config.defaults);
    assert!(initialize(&config, &device).await.is_err());
    // Nothing was seeded.
    assert_eq!(device.param(ParamName::Kp), Some(ParamValue::Float(1.0)));
}
