//! Benchmarks for the Bayesian global search.
//!
//! Surrogate fitting grows cubically with the number of samples and
//! acquisition scoring linearly with the number of candidates.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lmbopt_rs::evaluator::EvaluationFailure;
use lmbopt_rs::global_opt::{
    AcquisitionFunction, AcquisitionKind, BayesianOptimizer, GaussianProcess, GlobalOptimizer,
};
use lmbopt_rs::parameters::ParameterSet;
use lmbopt_rs::problem::{FitOptions, FitProblem};
use ndarray::{array, Array1};

fn bench_gaussian_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("gaussian_process_fit");

    for &n in &[10usize, 40, 100] {
        let x: Vec<Array1<f64>> = (0..n)
            .map(|i| array![(i as f64 * 0.618).fract(), (i as f64 * 0.414).fract()])
            .collect();
        let y: Vec<f64> = x.iter().map(|p| (6.0 * p[0]).sin() + p[1]).collect();

        group.bench_with_input(BenchmarkId::new("samples", n), &n, |b, _| {
            b.iter(|| GaussianProcess::fit(black_box(&x), black_box(&y), 1e-6))
        });
    }

    group.finish();
}

fn bench_acquisition(c: &mut Criterion) {
    let x: Vec<Array1<f64>> = (0..30).map(|i| array![i as f64 / 29.0]).collect();
    let y: Vec<f64> = x.iter().map(|p| -(p[0] - 0.3).powi(2)).collect();
    let gp = GaussianProcess::fit(&x, &y, 1e-6).unwrap();
    let candidates: Vec<Array1<f64>> = (0..10_000).map(|i| array![i as f64 / 9999.0]).collect();

    let mut group = c.benchmark_group("acquisition");
    for kind in [AcquisitionKind::Ucb, AcquisitionKind::Ei, AcquisitionKind::Poi] {
        let acq = AcquisitionFunction::new(kind, 2.576, 0.0);
        group.bench_function(format!("{:?}", kind), |b| {
            b.iter(|| {
                candidates
                    .iter()
                    .map(|p| {
                        let (mean, std) = gp.predict(p);
                        acq.evaluate(mean, std, 0.0)
                    })
                    .fold(f64::NEG_INFINITY, f64::max)
            })
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("bayesian_search");
    group.sample_size(10); // Each search fits dozens of surrogates

    let mut params = ParameterSet::new();
    params.add_param("beta", 0.1, 0.9).unwrap();
    let problem =
        FitProblem::new(array![1.0, 2.0, 3.0, 4.0], &params, &FitOptions::new()).unwrap();
    let model = |_: &ParameterSet, beta: &Array1<f64>| -> Result<Array1<f64>, EvaluationFailure> {
        Ok(array![1.0, 4.0, 9.0, 16.0].mapv(|x: f64| x.powf(beta[0])))
    };

    group.bench_function("power_law_30_samples", |b| {
        b.iter(|| {
            let mut optimizer = BayesianOptimizer::new().with_seed(5).with_n_warmup(1000);
            optimizer.search(&problem, &model, black_box(30), black_box(0.0), true)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_gaussian_process, bench_acquisition, bench_search);
criterion_main!(benches);
