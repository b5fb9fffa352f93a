//! Global search alternated with local refinement.
//!
//! Each round runs the global optimizer, seeds a Levenberg-Marquardt-Broyden
//! run at the global best, and feeds the local result back to the global
//! optimizer as its new incumbent.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{LmbOptError, Result};
use crate::evaluator::{CancellationToken, Evaluator};
use crate::global_opt::bayesian::{BayesianConfig, BayesianOptimizer};
use crate::global_opt::GlobalOptimizer;
use crate::lm::{LevenbergMarquardtBroyden, LmbConfig};
use crate::problem::FitProblem;
use crate::result::{FitResult, FitStatus, TraceEntry};

/// Configuration options for the combined strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombinedConfig {
    /// Global/local rounds. Default: 4
    pub rounds: usize,

    /// Global samples per round. Default: None (the run's iteration budget)
    pub global_iterations: Option<usize>,

    /// Global optimizer settings
    pub bayesian: BayesianConfig,

    /// Local solver settings
    pub lmb: LmbConfig,
}

impl Default for CombinedConfig {
    fn default() -> Self {
        Self {
            rounds: 4,
            global_iterations: None,
            bayesian: BayesianConfig::default(),
            lmb: LmbConfig::default(),
        }
    }
}

/// Combined global/local optimizer.
#[derive(Debug, Clone)]
pub struct CombinedStrategy<G: GlobalOptimizer = BayesianOptimizer> {
    /// Global optimizer
    pub global: G,

    /// Local solver
    pub local: LevenbergMarquardtBroyden,

    /// Global/local rounds
    pub rounds: usize,

    /// Global samples per round; None uses the run's iteration budget
    pub global_iterations: Option<usize>,

    cancellation: Option<CancellationToken>,
}

impl Default for CombinedStrategy {
    fn default() -> Self {
        Self::with_config(CombinedConfig::default())
    }
}

impl CombinedStrategy {
    /// Create a new CombinedStrategy with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new CombinedStrategy with the Bayesian optimizer.
    pub fn with_config(config: CombinedConfig) -> Self {
        Self {
            global: BayesianOptimizer::with_config(config.bayesian),
            local: LevenbergMarquardtBroyden::with_config(config.lmb),
            rounds: config.rounds,
            global_iterations: config.global_iterations,
            cancellation: None,
        }
    }
}

impl<G: GlobalOptimizer> CombinedStrategy<G> {
    /// Combine any global optimizer with a local solver.
    pub fn with_optimizers(global: G, local: LevenbergMarquardtBroyden) -> Self {
        Self {
            global,
            local,
            rounds: 4,
            global_iterations: None,
            cancellation: None,
        }
    }

    /// Set the number of rounds.
    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Set the global samples per round.
    pub fn with_global_iterations(mut self, iterations: usize) -> Self {
        self.global_iterations = Some(iterations);
        self
    }

    /// Stop both optimizers when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.global.set_cancellation(token.clone());
        self.local = self.local.with_cancellation(token.clone());
        self.cancellation = Some(token);
        self
    }

    /// Run the rounds.
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem to solve; its initial guesses span the global box
    /// * `evaluator` - The model
    /// * `max_iterations` - Iteration budget of each local run (and of each
    ///   global search unless `global_iterations` is set)
    /// * `tol` - Convergence threshold on the residual norm
    ///
    /// # Returns
    ///
    /// * The first converged result, or the best result of all rounds with
    ///   status `Exhausted`. Iterations and evaluations are cumulative.
    pub fn minimize<E: Evaluator + ?Sized>(
        &mut self,
        problem: &FitProblem,
        evaluator: &E,
        max_iterations: usize,
        tol: f64,
    ) -> Result<FitResult> {
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

        let global_iterations = self.global_iterations.unwrap_or(max_iterations);
        let mut progress = Progress::default();

        for round in 0..self.rounds {
            if self.is_cancelled() {
                return Ok(progress.finish(FitStatus::Cancelled));
            }

            let global = self.global.search(
                problem,
                evaluator,
                global_iterations,
                tol,
                round == 0,
            )?;
            debug!(
                "Round {}: global search norm = {:.6e} after {} samples",
                round + 1,
                global.norm,
                global.iterations
            );
            let global_status = global.status.clone();
            let seed = global.params.clone();
            progress.absorb(global);
            match global_status {
                FitStatus::Converged => {
                    info!("Combined search converged in the global phase of round {}", round + 1);
                    return Ok(progress.finish(FitStatus::Converged));
                }
                FitStatus::Cancelled => return Ok(progress.finish(FitStatus::Cancelled)),
                _ => {}
            }

            let Some(seed) = seed else {
                warn!("Round {}: global search found no valid point", round + 1);
                continue;
            };
            let seeded = problem.with_initial_guess(&problem.to_unscaled(&seed))?;
            let local = self.local.minimize(&seeded, evaluator, max_iterations, tol)?;
            debug!(
                "Round {}: local refinement norm = {:.6e} after {} iterations",
                round + 1,
                local.norm,
                local.iterations
            );
            let local_status = local.status.clone();
            let observed = match (&local.params, &local.residuals) {
                (Some(params), Some(residuals)) => Some((params.clone(), residuals.clone())),
                _ => None,
            };
            progress.absorb(local);
            match local_status {
                FitStatus::Converged => {
                    info!("Combined search converged in the local phase of round {}", round + 1);
                    return Ok(progress.finish(FitStatus::Converged));
                }
                FitStatus::Cancelled => return Ok(progress.finish(FitStatus::Cancelled)),
                _ => {}
            }

            if let Some((params, residuals)) = observed {
                self.global.observe(problem, &params, &residuals)?;
            }
        }

        info!(
            "Combined search used all {} rounds, best norm = {:.6e}",
            self.rounds, progress.best.as_ref().map_or(f64::INFINITY, |b| b.norm)
        );
        Ok(progress.finish(FitStatus::Exhausted))
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map_or(false, |token| token.is_cancelled())
    }
}

/// Running totals over all phases.
#[derive(Default)]
struct Progress {
    best: Option<FitResult>,
    iterations: usize,
    evaluations: usize,
    trace: Option<Vec<TraceEntry>>,
}

impl Progress {
    fn absorb(&mut self, mut result: FitResult) {
        if let Some(entries) = result.trace.take() {
            let offset = self.iterations;
            self.trace
                .get_or_insert_with(Vec::new)
                .extend(entries.into_iter().map(|mut e| {
                    e.iteration += offset;
                    e
                }));
        }
        self.iterations += result.iterations;
        self.evaluations += result.evaluations;

        let better = result.params.is_some()
            && self.best.as_ref().map_or(true, |b| result.norm < b.norm);
        if better {
            self.best = Some(result);
        }
    }

    fn finish(self, status: FitStatus) -> FitResult {
        let message = status.description();
        match self.best {
            Some(best) => FitResult {
                norm: best.norm,
                iterations: self.iterations,
                params: best.params,
                residuals: best.residuals,
                status,
                evaluations: self.evaluations,
                message,
                trace: self.trace,
            },
            None => FitResult {
                norm: f64::INFINITY,
                iterations: self.iterations,
                params: None,
                residuals: None,
                status,
                evaluations: self.evaluations,
                message,
                trace: self.trace,
            },
        }
    }
}
