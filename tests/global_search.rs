//! Integration tests for the Bayesian global search.

use lmbopt_rs::global_opt::{AcquisitionKind, Objective};
use lmbopt_rs::{
    global_search, BayesianConfig, BayesianOptimizer, CancellationToken, EvaluationFailure,
    FitOptions, FitProblem, FitStatus, GlobalOptimizer, Parameter, ParameterSet,
};
use ndarray::{array, Array1};
use std::cell::RefCell;

type EvalResult = Result<Array1<f64>, EvaluationFailure>;

fn config(seed: u64) -> BayesianConfig {
    BayesianConfig {
        n_warmup: 500,
        seed: Some(seed),
        ..BayesianConfig::default()
    }
}

/// Records every evaluated point.
fn recording<'a>(
    seen: &'a RefCell<Vec<Array1<f64>>>,
) -> impl Fn(&ParameterSet, &Array1<f64>) -> EvalResult + 'a {
    move |_: &ParameterSet, beta: &Array1<f64>| {
        seen.borrow_mut().push(beta.clone());
        Ok(array![1.0, 4.0, 9.0, 16.0].mapv(|x: f64| x.powf(beta[0])))
    }
}

#[test]
fn test_power_law_global_search() {
    let mut params = ParameterSet::new();
    params.add_param("beta", 0.1, 0.9).unwrap();
    let seen = RefCell::new(Vec::new());

    let result = global_search(
        array![1.0, 2.0, 3.0, 4.0],
        &params,
        &recording(&seen),
        40,
        1e-4,
        &FitOptions::new(),
        &config(21),
    )
    .unwrap();

    let beta = result.params.unwrap()[0];
    assert!((beta - 0.5).abs() < 0.05, "beta = {}", beta);
    assert_eq!(result.evaluations, seen.borrow().len());
    assert!(result.iterations <= 40);
}

#[test]
fn test_bounds_repair() {
    // Reversed, zero-width at zero, zero-width away from zero
    let mut params = ParameterSet::new();
    params.add_param("a", 2.0, -1.0).unwrap();
    params.add_param("b", 0.0, 0.0).unwrap();
    params.add_param("c", -3.0, -3.0).unwrap();
    let problem = FitProblem::new(array![1.0, 2.0, 3.0], &params, &FitOptions::new()).unwrap();

    let bounds = problem.search_bounds();
    assert_eq!((bounds[0].min, bounds[0].max), (-1.0, 2.0));
    assert_eq!((bounds[1].min, bounds[1].max), (0.0, 7.0));
    assert_eq!((bounds[2].min, bounds[2].max), (-3.0, 0.0));

    let seen = RefCell::new(Vec::new());
    let model = |_: &ParameterSet, beta: &Array1<f64>| -> EvalResult {
        seen.borrow_mut().push(beta.clone());
        Ok(array![beta[0], beta[1], beta[2]])
    };
    BayesianOptimizer::with_config(config(4))
        .search(&problem, &model, 12, 0.0, true)
        .unwrap();
    for point in seen.borrow().iter() {
        for (value, b) in point.iter().zip(bounds.iter()) {
            assert!(b.is_within_bounds(*value), "{} outside [{}, {}]", value, b.min, b.max);
        }
    }
}

#[test]
fn test_boxes_wider_than_f64_are_searched() {
    let mut params = ParameterSet::new();
    params.add_param("wide", -1e308, 1e308).unwrap();
    params.add_param("top", 1e308, 1e308).unwrap();
    let problem = FitProblem::new(array![1.0, 1.0], &params, &FitOptions::new()).unwrap();
    let bounds = problem.search_bounds();

    let seen = RefCell::new(Vec::new());
    let model = |_: &ParameterSet, beta: &Array1<f64>| -> EvalResult {
        seen.borrow_mut().push(beta.clone());
        Ok(array![beta[0].signum(), 1.0])
    };
    let result = BayesianOptimizer::with_config(config(8))
        .search(&problem, &model, 8, 0.0, true)
        .unwrap();

    assert_eq!(result.iterations, 8);
    assert_eq!(seen.borrow().len(), 8);
    for point in seen.borrow().iter() {
        for (value, b) in point.iter().zip(bounds.iter()) {
            assert!(value.is_finite());
            assert!(b.is_within_bounds(*value), "{} outside [{}, {}]", value, b.min, b.max);
        }
    }
}

#[test]
fn test_search_box_is_in_physical_units() {
    let mut params = ParameterSet::new();
    params
        .add(Parameter::new("enthalpy", -2.0, 2.0).unwrap().with_scale(1e4).unwrap())
        .unwrap();
    let problem = FitProblem::new(array![5000.0], &params, &FitOptions::new()).unwrap();

    let seen = RefCell::new(Vec::new());
    let model = |_: &ParameterSet, beta: &Array1<f64>| -> EvalResult {
        seen.borrow_mut().push(beta[0]);
        Ok(array![beta[0]])
    };
    let result = BayesianOptimizer::with_config(config(8))
        .search(&problem, &model, 15, 0.0, true)
        .unwrap();

    assert!(seen.borrow().iter().all(|v| (-2e4..=2e4).contains(v)));
    assert!(seen.borrow().iter().any(|v| v.abs() > 2.0));
    let lowest = seen
        .borrow()
        .iter()
        .map(|v| ((v - 5000.0) / 5000.0).powi(2))
        .fold(f64::INFINITY, f64::min);
    assert!((result.norm - lowest).abs() <= 1e-12 * lowest.max(1.0));
}

#[test]
fn test_fixed_seed_is_reproducible() {
    let run = |seed: u64| {
        let mut params = ParameterSet::new();
        params.add_param("beta", 0.1, 0.9).unwrap();
        let seen = RefCell::new(Vec::new());
        global_search(
            array![1.0, 2.0, 3.0, 4.0],
            &params,
            &recording(&seen),
            12,
            0.0,
            &FitOptions::new(),
            &config(seed),
        )
        .unwrap();
        seen.into_inner()
    };
    assert_eq!(run(17), run(17));
    assert_ne!(run(17), run(18));
}

#[test]
fn test_every_acquisition_and_objective_runs() {
    let mut params = ParameterSet::new();
    params.add_param("beta", 0.1, 0.9).unwrap();
    let problem = FitProblem::new(array![1.0, 2.0, 3.0, 4.0], &params, &FitOptions::new()).unwrap();
    let model = |_: &ParameterSet, beta: &Array1<f64>| -> EvalResult {
        Ok(array![1.0, 4.0, 9.0, 16.0].mapv(|x: f64| x.powf(beta[0])))
    };

    for acquisition in [AcquisitionKind::Ucb, AcquisitionKind::Ei, AcquisitionKind::Poi] {
        for objective in [Objective::InverseNorm, Objective::NegativeNorm, Objective::RSquared] {
            let result = BayesianOptimizer::with_config(BayesianConfig {
                acquisition,
                objective,
                xi: 0.01,
                ..config(2)
            })
            .search(&problem, &model, 15, 0.0, true)
            .unwrap();
            assert_eq!(result.status, FitStatus::Exhausted);
            assert_eq!(result.iterations, 15);
            assert!(result.norm.is_finite());
        }
    }
}

#[test]
fn test_cancelled_before_start() {
    let mut params = ParameterSet::new();
    params.add_param("beta", 0.1, 0.9).unwrap();
    let problem = FitProblem::new(array![1.0, 2.0], &params, &FitOptions::new()).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let model = |_: &ParameterSet, _: &Array1<f64>| -> EvalResult { panic!("must not be called") };
    let result = BayesianOptimizer::with_config(config(1))
        .with_cancellation(token)
        .search(&problem, &model, 10, 0.0, true)
        .unwrap();
    assert_eq!(result.status, FitStatus::Cancelled);
    assert_eq!(result.iterations, 0);
    assert!(result.params.is_none());
}

#[test]
fn test_empty_problem() {
    let result = global_search(
        array![1.0],
        &ParameterSet::new(),
        &|_: &ParameterSet, _: &Array1<f64>| -> EvalResult { Ok(array![1.0]) },
        10,
        0.0,
        &FitOptions::new(),
        &BayesianConfig::default(),
    )
    .unwrap();
    assert_eq!(result.status, FitStatus::InvalidProblemSize);
}
