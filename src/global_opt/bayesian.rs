//! Bayesian global search.
//!
//! Random warm-up samples are followed by guided samples, each chosen by
//! maximizing an acquisition function over a Gaussian-process surrogate of
//! the objective. The search box lives in physical units and, optionally,
//! shrinks around the incumbent with sequential domain reduction.

use log::{debug, info, warn};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{LmbOptError, Result};
use crate::evaluator::{checked_evaluate, CancellationToken, Evaluator};
use crate::global_opt::acquisition::{AcquisitionFunction, AcquisitionKind};
use crate::global_opt::domain_reduction::SequentialDomainReduction;
use crate::global_opt::gaussian_process::GaussianProcess;
use crate::global_opt::parallel::{best_candidate, random_candidates, score_candidates};
use crate::global_opt::GlobalOptimizer;
use crate::parameters::Bounds;
use crate::problem::FitProblem;
use crate::residual::{compute_residual, model_output, r_squared, Residual};
use crate::result::{FitResult, FitStatus, Phase, TraceEntry};

/// Largest target produced by [`Objective::InverseNorm`].
pub const INVERSE_NORM_CAP: f64 = 1e100;

/// Quantity the global search maximizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// `1 / norm`
    InverseNorm,

    /// `-norm`
    NegativeNorm,

    /// Weighted coefficient of determination of the model output
    RSquared,
}

impl Default for Objective {
    fn default() -> Self {
        Objective::InverseNorm
    }
}

impl Objective {
    /// Target value of one evaluated point.
    pub fn target(&self, problem: &FitProblem, output: &Array1<f64>, norm: f64) -> Result<f64> {
        match self {
            Objective::InverseNorm => Ok(if norm > 1.0 / INVERSE_NORM_CAP {
                1.0 / norm
            } else {
                INVERSE_NORM_CAP
            }),
            Objective::NegativeNorm => Ok(-norm),
            Objective::RSquared => r_squared(problem.reference(), output, problem.weight()),
        }
    }
}

/// Configuration options for the Bayesian optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BayesianConfig {
    /// Acquisition function. Default: Ucb
    pub acquisition: AcquisitionKind,

    /// Random samples drawn before the surrogate is used. Default: 10
    pub init_points: usize,

    /// UCB exploration weight. Default: 2.576
    pub kappa: f64,

    /// Factor applied to kappa per guided sample once the delay has passed. Default: 0.9
    pub kappa_decay: f64,

    /// Guided samples before kappa starts to decay. Default: 10
    pub kappa_decay_delay: usize,

    /// Improvement margin for EI and POI. Default: 0.0
    pub xi: f64,

    /// Shrink the search box around the incumbent. Default: true
    pub domain_reduction: bool,

    /// Contraction when the incumbent oscillates. Default: 0.01
    pub gamma_osc: f64,

    /// Contraction when the incumbent pans. Default: 1.0
    pub gamma_pan: f64,

    /// Zoom when the incumbent stands still. Default: 1.0
    pub eta: f64,

    /// Smallest search-box width per dimension (physical units). Default: 0.0
    pub minimum_window: f64,

    /// Noise variance of the surrogate (standardized units). Default: 1e-6
    pub alpha: f64,

    /// Random candidates scored per suggestion. Default: 10000
    pub n_warmup: usize,

    /// Compass refinement sweeps on the best candidate. Default: 50
    pub refine_iterations: usize,

    /// Quantity to maximize. Default: InverseNorm
    pub objective: Objective,

    /// Seed for reproducible runs. Default: None (entropy)
    pub seed: Option<u64>,

    /// Record one trace entry per registered sample. Default: false
    pub record_trace: bool,
}

impl Default for BayesianConfig {
    fn default() -> Self {
        Self {
            acquisition: AcquisitionKind::default(),
            init_points: 10,
            kappa: 2.576,
            kappa_decay: 0.9,
            kappa_decay_delay: 10,
            xi: 0.0,
            domain_reduction: true,
            gamma_osc: 0.01,
            gamma_pan: 1.0,
            eta: 1.0,
            minimum_window: 0.0,
            alpha: 1e-6,
            n_warmup: 10000,
            refine_iterations: 50,
            objective: Objective::default(),
            seed: None,
            record_trace: false,
        }
    }
}

impl BayesianConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        let check = |ok: bool, what: &str| {
            if ok {
                Ok(())
            } else {
                Err(LmbOptError::InvalidParameter(what.to_string()))
            }
        };
        check(self.kappa.is_finite() && self.kappa >= 0.0, "kappa must be non-negative")?;
        check(
            self.kappa_decay > 0.0 && self.kappa_decay <= 1.0,
            "kappa_decay must be in (0, 1]",
        )?;
        check(self.xi.is_finite(), "xi must be finite")?;
        check(
            self.gamma_osc > 0.0 && self.gamma_osc <= 1.0,
            "gamma_osc must be in (0, 1]",
        )?;
        check(
            self.gamma_pan > 0.0 && self.gamma_pan <= 1.0,
            "gamma_pan must be in (0, 1]",
        )?;
        check(self.eta > 0.0 && self.eta <= 1.0, "eta must be in (0, 1]")?;
        check(
            self.minimum_window.is_finite() && self.minimum_window >= 0.0,
            "minimum_window must be non-negative",
        )?;
        check(self.alpha.is_finite() && self.alpha >= 0.0, "alpha must be non-negative")?;
        check(self.n_warmup > 0, "n_warmup must be positive")
    }
}

/// One registered point.
#[derive(Debug, Clone)]
struct Sample {
    params: Array1<f64>,
    target: f64,
    norm: f64,
    residuals: Array1<f64>,
}

/// Fixed normalization frame plus the current (possibly reduced) box.
#[derive(Debug, Clone)]
struct SearchSpace {
    frame: Vec<Bounds>,
    current: Vec<Bounds>,
    reducer: Option<SequentialDomainReduction>,
}

impl SearchSpace {
    fn to_unit(&self, x: &Array1<f64>) -> Array1<f64> {
        x.iter()
            .zip(self.frame.iter())
            .map(|(&v, b)| (v - b.min) / b.width())
            .collect()
    }

    /// Unit coordinates back to physical ones, kept inside the current box.
    fn from_unit(&self, u: &Array1<f64>) -> Array1<f64> {
        u.iter()
            .zip(self.frame.iter().zip(self.current.iter()))
            .map(|(&v, (f, c))| c.clamp(f.min + v * f.width()))
            .collect()
    }

    /// Current box in unit coordinates.
    fn unit_box(&self) -> (Array1<f64>, Array1<f64>) {
        let low = self
            .current
            .iter()
            .zip(self.frame.iter())
            .map(|(c, f)| (c.min - f.min) / f.width())
            .collect();
        let high = self
            .current
            .iter()
            .zip(self.frame.iter())
            .map(|(c, f)| (c.max - f.min) / f.width())
            .collect();
        (low, high)
    }
}

/// Bayesian optimizer with a Gaussian-process surrogate.
///
/// Registered samples persist across [`GlobalOptimizer::search`] calls, so
/// a later call continues from everything learned so far.
#[derive(Debug, Clone)]
pub struct BayesianOptimizer {
    config: BayesianConfig,
    cancellation: Option<CancellationToken>,
    rng: StdRng,
    space: Option<SearchSpace>,
    samples: Vec<Sample>,
}

impl Default for BayesianOptimizer {
    fn default() -> Self {
        Self::with_config(BayesianConfig::default())
    }
}

impl BayesianOptimizer {
    /// Create a new BayesianOptimizer with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new BayesianOptimizer with the given configuration.
    pub fn with_config(config: BayesianConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            cancellation: None,
            rng,
            space: None,
            samples: Vec::new(),
        }
    }

    pub fn config(&self) -> &BayesianConfig {
        &self.config
    }

    /// Set the acquisition function.
    pub fn with_acquisition(mut self, kind: AcquisitionKind) -> Self {
        self.config.acquisition = kind;
        self
    }

    /// Set the number of random warm-up samples.
    pub fn with_init_points(mut self, init_points: usize) -> Self {
        self.config.init_points = init_points;
        self
    }

    /// Set the UCB exploration weight.
    pub fn with_kappa(mut self, kappa: f64) -> Self {
        self.config.kappa = kappa;
        self
    }

    /// Set the kappa decay factor and the number of guided samples before it applies.
    pub fn with_kappa_decay(mut self, decay: f64, delay: usize) -> Self {
        self.config.kappa_decay = decay;
        self.config.kappa_decay_delay = delay;
        self
    }

    /// Set the improvement margin for EI and POI.
    pub fn with_xi(mut self, xi: f64) -> Self {
        self.config.xi = xi;
        self
    }

    /// Enable or disable sequential domain reduction.
    pub fn with_domain_reduction(mut self, enabled: bool) -> Self {
        self.config.domain_reduction = enabled;
        self
    }

    /// Set the number of random candidates scored per suggestion.
    pub fn with_n_warmup(mut self, n_warmup: usize) -> Self {
        self.config.n_warmup = n_warmup;
        self
    }

    /// Set the objective.
    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.config.objective = objective;
        self
    }

    /// Reseed the random number generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Record a per-sample trace in the result.
    pub fn with_trace(mut self, record: bool) -> Self {
        self.config.record_trace = record;
        self
    }

    /// Stop searching when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Number of registered samples.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Current search box (physical units), once a search has started.
    pub fn bounds(&self) -> Option<&[Bounds]> {
        self.space.as_ref().map(|s| s.current.as_slice())
    }

    /// Forget all samples and the search box.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.space = None;
    }

    fn prepare(&mut self, problem: &FitProblem) {
        let n = problem.parameter_count();
        if let Some(space) = &self.space {
            if space.frame.len() == n {
                return;
            }
            warn!(
                "Global search reused for a problem with {} parameters instead of {}, starting over",
                n,
                space.frame.len()
            );
            self.samples.clear();
        }

        let frame = problem.search_bounds();
        let reducer = if self.config.domain_reduction {
            Some(SequentialDomainReduction::new(
                &frame,
                self.config.gamma_osc,
                self.config.gamma_pan,
                self.config.eta,
                self.config.minimum_window,
            ))
        } else {
            None
        };
        self.space = Some(SearchSpace {
            current: frame.clone(),
            frame,
            reducer,
        });
    }

    fn register(
        &mut self,
        problem: &FitProblem,
        params: Array1<f64>,
        output: &Array1<f64>,
        residual: Residual,
    ) -> Result<()> {
        let target = self.config.objective.target(problem, output, residual.norm)?;
        self.samples.push(Sample {
            params,
            target,
            norm: residual.norm,
            residuals: residual.r,
        });
        Ok(())
    }

    fn incumbent(&self) -> Option<&Sample> {
        self.samples
            .iter()
            .fold(None, |best: Option<&Sample>, s| match best {
                Some(b) if b.target >= s.target => Some(b),
                _ => Some(s),
            })
    }

    fn lowest_norm(&self) -> Option<&Sample> {
        self.samples
            .iter()
            .fold(None, |best: Option<&Sample>, s| match best {
                Some(b) if b.norm <= s.norm => Some(b),
                _ => Some(s),
            })
    }

    fn random_point(&mut self, space: &SearchSpace) -> Array1<f64> {
        let low: Array1<f64> = space.current.iter().map(|b| b.min).collect();
        let high: Array1<f64> = space.current.iter().map(|b| b.max).collect();
        random_candidates(&low, &high, 1, &mut self.rng)
            .pop()
            .unwrap_or(low)
    }

    /// Next point to evaluate (physical units).
    fn suggest(&mut self, space: &SearchSpace, acquisition: &mut AcquisitionFunction) -> Array1<f64> {
        if self.samples.is_empty() {
            return self.random_point(space);
        }

        let xs: Vec<Array1<f64>> = self.samples.iter().map(|s| space.to_unit(&s.params)).collect();
        let ys: Vec<f64> = self.samples.iter().map(|s| s.target).collect();
        let gp = match GaussianProcess::fit(&xs, &ys, self.config.alpha) {
            Ok(gp) => gp,
            Err(e) => {
                warn!("Surrogate fit failed ({}), sampling at random", e);
                return self.random_point(space);
            }
        };
        let y_max = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        acquisition.update_params();
        let (low, high) = space.unit_box();
        let candidates = random_candidates(&low, &high, self.config.n_warmup, &mut self.rng);
        let scores = score_candidates(&gp, acquisition, &candidates, y_max);
        let Some((index, score)) = best_candidate(&scores) else {
            return self.random_point(space);
        };

        let refined = self.compass_refine(&gp, acquisition, y_max, &candidates[index], score, &low, &high);
        let point = space.from_unit(&refined);

        if xs.iter().any(|x| {
            x.iter()
                .zip(refined.iter())
                .all(|(a, b)| (a - b).abs() <= 1e-9)
        }) {
            debug!("Suggested point was already sampled, drawing a random one instead");
            return self.random_point(space);
        }
        point
    }

    /// Coordinate-wise pattern search on the acquisition, inside the unit box.
    #[allow(clippy::too_many_arguments)]
    fn compass_refine(
        &self,
        gp: &GaussianProcess,
        acquisition: &AcquisitionFunction,
        y_max: f64,
        start: &Array1<f64>,
        start_score: f64,
        low: &Array1<f64>,
        high: &Array1<f64>,
    ) -> Array1<f64> {
        let mut x = start.clone();
        let mut score = start_score;
        let mut step: Array1<f64> = (high - low) * 0.1;

        for _ in 0..self.config.refine_iterations {
            let mut improved = false;
            for j in 0..x.len() {
                for direction in [1.0, -1.0] {
                    let mut trial = x.clone();
                    trial[j] = (trial[j] + direction * step[j]).clamp(low[j], high[j]);
                    if trial[j] == x[j] {
                        continue;
                    }
                    let (mean, std) = gp.predict(&trial);
                    let trial_score = acquisition.evaluate(mean, std, y_max);
                    if trial_score > score {
                        x = trial;
                        score = trial_score;
                        improved = true;
                        break;
                    }
                }
            }
            if !improved {
                step *= 0.5;
                if step.iter().all(|&s| s < 1e-9) {
                    break;
                }
            }
        }
        x
    }

    fn finish(
        &self,
        status: FitStatus,
        iterations: usize,
        evaluations: usize,
        trace: Option<Vec<TraceEntry>>,
    ) -> FitResult {
        let best = self.lowest_norm();
        FitResult {
            norm: best.map_or(f64::INFINITY, |s| s.norm),
            iterations,
            params: best.map(|s| s.params.clone()),
            residuals: best.map(|s| s.residuals.clone()),
            message: status.description(),
            status,
            evaluations,
            trace,
        }
    }
}

impl GlobalOptimizer for BayesianOptimizer {
    fn search<E: Evaluator + ?Sized>(
        &mut self,
        problem: &FitProblem,
        evaluator: &E,
        max_iterations: usize,
        tol: f64,
        warm_up: bool,
    ) -> Result<FitResult> {
        self.config.validate()?;
        if tol.is_nan() {
            return Err(LmbOptError::InvalidInput("tolerance is NaN".to_string()));
        }
        if problem.is_empty() {
            warn!(
                "Nothing to fit: {} optimized parameters, {} reference values",
                problem.parameter_count(),
                problem.residual_count()
            );
            return Ok(FitResult::invalid_problem_size());
        }

        self.prepare(problem);
        let mut space = match self.space.take() {
            Some(space) => space,
            None => {
                return Err(LmbOptError::InvalidInput(
                    "global search space is not initialized".to_string(),
                ))
            }
        };
        let result = self.run(problem, evaluator, &mut space, max_iterations, tol, warm_up);
        self.space = Some(space);
        result
    }

    fn observe(
        &mut self,
        problem: &FitProblem,
        params: &Array1<f64>,
        residuals: &Array1<f64>,
    ) -> Result<()> {
        if params.len() != problem.parameter_count() {
            return Err(LmbOptError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                problem.parameter_count(),
                params.len()
            )));
        }
        self.prepare(problem);
        let output = model_output(residuals, problem.reference())?;
        let residual = compute_residual(&output, problem.reference())?;
        debug!("Registering external point with norm {:.6e}", residual.norm);
        self.register(problem, params.clone(), &output, residual)
    }

    fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancellation = Some(token);
    }
}

impl BayesianOptimizer {
    fn run<E: Evaluator + ?Sized>(
        &mut self,
        problem: &FitProblem,
        evaluator: &E,
        space: &mut SearchSpace,
        max_iterations: usize,
        tol: f64,
        warm_up: bool,
    ) -> Result<FitResult> {
        let m = problem.residual_count();
        let warm = if warm_up {
            self.config.init_points.min(max_iterations)
        } else {
            0
        };
        let mut acquisition =
            AcquisitionFunction::new(self.config.acquisition, self.config.kappa, self.config.xi)
                .with_decay(self.config.kappa_decay, self.config.kappa_decay_delay);
        let mut evaluations = 0;
        let mut trace: Option<Vec<TraceEntry>> = self.config.record_trace.then(Vec::new);

        for it in 0..max_iterations {
            if let Some(token) = &self.cancellation {
                if token.is_cancelled() {
                    info!("Global search cancelled");
                    return Ok(self.finish(FitStatus::Cancelled, it, evaluations, trace));
                }
            }

            let guided = it >= warm;
            let x = if guided {
                self.suggest(space, &mut acquisition)
            } else {
                self.random_point(space)
            };

            evaluations += 1;
            match checked_evaluate(evaluator, problem.catalog(), &x, m) {
                Ok(f) => {
                    let residual = compute_residual(&f, problem.reference())?;
                    let norm = residual.norm;
                    self.register(problem, x.clone(), &f, residual)?;
                    let best_norm = self.lowest_norm().map_or(norm, |s| s.norm);
                    debug!(
                        "Global sample {} ({}): norm = {:.6e}, best = {:.6e}",
                        it + 1,
                        if guided { "guided" } else { "warm-up" },
                        norm,
                        best_norm
                    );
                    if let Some(entries) = trace.as_mut() {
                        entries.push(TraceEntry {
                            iteration: it,
                            phase: Phase::Global,
                            params: x,
                            norm,
                            best_norm,
                            lambda: None,
                        });
                    }
                    if norm < tol {
                        info!("Global search converged after {} samples, norm = {:.6e}", it + 1, norm);
                        return Ok(self.finish(FitStatus::Converged, it + 1, evaluations, trace));
                    }
                }
                Err(err) => {
                    warn!("Global sample {} failed ({}), skipping it", it + 1, err);
                }
            }

            if guided {
                if let (Some(reducer), Some(incumbent)) =
                    (space.reducer.as_mut(), self.incumbent())
                {
                    space.current = reducer.update(&incumbent.params).to_vec();
                }
            }
        }

        info!(
            "Global search used all {} samples, best norm = {:.6e}",
            max_iterations,
            self.lowest_norm().map_or(f64::INFINITY, |s| s.norm)
        );
        Ok(self.finish(FitStatus::Exhausted, max_iterations, evaluations, trace))
    }
}
