/// 設定載入測試
use stealth_exposure::config::{ExposureConfig, MAX_OBSERVERS, OBSERVERS_PER_FRAME};
use stealth_exposure::ExposureError;

#[test]
fn test_defaults() {
    let config = ExposureConfig::default();
    assert_eq!(config.scheduler.observers_per_frame, OBSERVERS_PER_FRAME);
    assert_eq!(config.scheduler.max_observers, MAX_OBSERVERS);
    assert_eq!(config.crouch.height_bias(0.0), 3.0);
    assert_eq!(config.crouch.height_bias(48.0), 6.0);
    assert_eq!(config.crouch.height_bias(1000.0), 12.0);
    assert!(config.validate().is_ok());
    assert!(config.worker_threads() >= 1);
}

/// 只寫部分欄位時其餘沿用預設值
#[test]
fn test_partial_toml() {
    let config = ExposureConfig::from_toml_str(
        r#"
[scheduler]
observers_per_frame = 4
use_accelerated = true

[crouch]
divide = 16.0
"#,
    )
    .unwrap();
    assert_eq!(config.scheduler.observers_per_frame, 4);
    assert!(config.scheduler.use_accelerated);
    assert_eq!(config.scheduler.max_observers, MAX_OBSERVERS);
    assert_eq!(config.crouch.divide, 16.0);
    assert_eq!(config.crouch.max, 12.0);
    assert_eq!(config.threat.height_band, 2.9);
}

#[test]
fn test_yaml_and_json() {
    let yaml = ExposureConfig::from_yaml_str(
        "scheduler:\n  max_observers: 24\nthreat:\n  stealth_max_c: 1.2\n",
    )
    .unwrap();
    assert_eq!(yaml.scheduler.max_observers, 24);
    assert_eq!(yaml.threat.stealth_max_c, 1.2);

    let json = ExposureConfig::from_json_str(r#"{"queries": {"nearby_radius_cells": 6}}"#).unwrap();
    assert_eq!(json.queries.nearby_radius_cells, 6);
    assert_eq!(json.scheduler, ExposureConfig::default().scheduler);
}

#[test]
fn test_invalid_values_rejected() {
    let cases = [
        "[scheduler]\nobservers_per_frame = 0\n",
        "[scheduler]\nmax_observers = 0\n",
        "[scheduler]\nmax_observers = 1000\n",
        "[scheduler]\nmax_hazard_spheres = 500\n",
        "[crouch]\nmin = 20.0\nmax = 10.0\n",
        "[crouch]\ndivide = 0.0\n",
        "[queries]\nnearby_radius_cells = -1\n",
    ];
    for case in cases {
        match ExposureConfig::from_toml_str(case) {
            Err(ExposureError::InvalidConfig(_)) => {}
            other => panic!("{:?} 應被拒絕，得到 {:?}", case, other),
        }
    }
}

#[test]
fn test_parse_errors() {
    assert!(matches!(
        ExposureConfig::from_toml_str("[scheduler\n"),
        Err(ExposureError::ConfigToml(_))
    ));
    assert!(matches!(
        ExposureConfig::from_json_str("{"),
        Err(ExposureError::ConfigJson(_))
    ));
    assert!(matches!(
        ExposureConfig::load_from_file("exposure.ini"),
        Err(ExposureError::ConfigIo { .. })
    ));
}

/// 倉庫根目錄附帶的設定檔可直接載入
#[test]
fn test_bundled_config() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/exposure.toml");
    let config = ExposureConfig::load_from_file(path).unwrap();
    assert!(config.scheduler.use_accelerated);
    assert_eq!(config.scheduler.observers_per_frame, OBSERVERS_PER_FRAME);
}
