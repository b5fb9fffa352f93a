//! Integration tests for JSON run configuration.

use lmbopt_rs::global_opt::{AcquisitionKind, Objective};
use lmbopt_rs::lm::DampingSchedule;
use lmbopt_rs::{EvaluationFailure, LmbOptError, Method, OptimizerConfig, ParameterSet};
use ndarray::{array, Array1};
use std::path::PathBuf;

fn data_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("data").join(name)
}

#[test]
fn test_load_config_file() {
    let config = OptimizerConfig::load_json(data_file("combined.json")).unwrap();

    assert_eq!(config.method, Method::Combined);
    assert_eq!(config.max_iterations, 50);
    assert_eq!(config.options.weight, Some(vec![1.0, 1.0, 1.0, 2.0]));
    assert_eq!(config.combined.rounds, 3);
    assert_eq!(config.combined.global_iterations, Some(8));
    assert_eq!(config.combined.bayesian.acquisition, AcquisitionKind::Ucb);
    assert_eq!(config.combined.bayesian.objective, Objective::InverseNorm);
    assert_eq!(config.combined.bayesian.seed, Some(7));
    assert_eq!(config.combined.lmb.damping, DampingSchedule::InverseSquare);
    // Unlisted fields keep their defaults
    assert_eq!(config.combined.bayesian.alpha, 1e-6);
    assert_eq!(config.combined.lmb.max_step_ratio, None);
}

#[test]
fn test_config_file_round_trip() {
    let config = OptimizerConfig::load_json(data_file("combined.json")).unwrap();
    let json = config.to_json().unwrap();
    assert_eq!(OptimizerConfig::from_json(&json).unwrap(), config);
}

#[test]
fn test_run_from_config_file() {
    let config = OptimizerConfig::load_json(data_file("combined.json")).unwrap();
    let mut params = ParameterSet::new();
    params.add_param("beta", 0.1, 0.9).unwrap();
    let model = |_: &ParameterSet, beta: &Array1<f64>| -> Result<Array1<f64>, EvaluationFailure> {
        Ok(array![1.0, 4.0, 9.0, 16.0].mapv(|x: f64| x.powf(beta[0])))
    };

    let result = config.run(array![1.0, 2.0, 3.0, 4.0], &params, &model).unwrap();
    assert!(result.success());
    assert!((result.params.unwrap()[0] - 0.5).abs() < 1e-3);
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        OptimizerConfig::load_json(data_file("missing.json")),
        Err(LmbOptError::IoError(_))
    ));
}
