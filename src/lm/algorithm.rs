//! Implementation of the Levenberg-Marquardt-Broyden algorithm.
//!
//! The solver never differentiates the model. It starts from the first
//! initial guess, moves the parameters one at a time to their second guess
//! (the bootstrap, which gives the secant Jacobian one column of information
//! per parameter), and then takes damped quasi-Newton steps while refining
//! the Jacobian with one Broyden update per evaluation.

use log::{debug, info, warn};
use ndarray::Array1;

use crate::error::{LmbOptError, Result};
use crate::evaluator::{checked_evaluate, CancellationToken, EvaluationFailure, Evaluator};
use crate::problem::FitProblem;
use crate::residual::{compute_residual, Residual};
use crate::result::{AbortReason, FitResult, FitStatus, TraceEntry};

use super::broyden::BroydenJacobian;
use super::config::{DampingSchedule, LmbConfig};
use super::status::{probe_value, IterationRecord, IterationState};
use super::step::DampedStep;

/// Outcome of one guarded evaluator call.
enum Evaluation {
    Done(Residual),
    Failed(EvaluationFailure),
    Cancelled,
}

/// The Levenberg-Marquardt-Broyden optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardtBroyden {
    /// Configuration options
    config: LmbConfig,

    /// Checked before every evaluation
    cancellation: Option<CancellationToken>,
}

impl LevenbergMarquardtBroyden {
    /// Create a new optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new optimizer with the given configuration.
    pub fn with_config(config: LmbConfig) -> Self {
        Self {
            config,
            cancellation: None,
        }
    }

    pub fn config(&self) -> &LmbConfig {
        &self.config
    }

    /// Set the damping schedule.
    pub fn with_damping(mut self, damping: DampingSchedule) -> Self {
        self.config.damping = damping;
        self
    }

    /// Set the weight of the failed point in the retry after an evaluation failure.
    pub fn with_retry_blend(mut self, blend: f64) -> Self {
        self.config.retry_blend = blend;
        self
    }

    /// Cap each step component relative to the previous change of that component.
    pub fn with_max_step_ratio(mut self, ratio: f64) -> Self {
        self.config.max_step_ratio = Some(ratio);
        self
    }

    /// Set whether to record every accepted iterate.
    pub fn with_trace(mut self, record_trace: bool) -> Self {
        self.config.record_trace = record_trace;
        self
    }

    /// Stop the run when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Fit the problem's optimized parameters.
    ///
    /// # Arguments
    ///
    /// * `problem` - The validated fitting task
    /// * `evaluator` - The black-box model
    /// * `max_iterations` - Iteration budget; one iteration is one accepted point
    /// * `tol` - The run converges once the norm falls below this value
    ///
    /// # Returns
    ///
    /// * The best point found, with the reason the run stopped. Evaluation
    ///   and linear-system failures end the run but are reported through
    ///   [`FitStatus::Aborted`], not as errors.
    ///
    /// # Errors
    ///
    /// * `InvalidParameter` for an invalid configuration
    /// * `InvalidInput` for a NaN tolerance
    pub fn minimize<E: Evaluator + ?Sized>(
        &self,
        problem: &FitProblem,
        evaluator: &E,
        max_iterations: usize,
        tol: f64,
    ) -> Result<FitResult> {
        self.config.validate()?;
        if tol.is_nan() {
            return Err(LmbOptError::InvalidInput("tolerance is NaN".to_string()));
        }

        let n = problem.parameter_count();
        let m = problem.residual_count();
        if problem.is_empty() {
            warn!(
                "Nothing to fit: {} optimized parameters, {} reference values",
                n, m
            );
            return Ok(FitResult::invalid_problem_size());
        }

        let (v0, v1) = problem.initial();
        let mut evaluations = 0;
        let mut trace = if self.config.record_trace {
            Some(Vec::new())
        } else {
            None
        };

        if max_iterations == 0 {
            return Ok(self.finish(problem, FitStatus::Exhausted, 0, None, evaluations, trace));
        }

        // Iteration 0: first initial guess. A failure here has nothing to fall back on.
        let beta = v0.clone();
        let residual = match self.evaluate(problem, evaluator, &beta, &mut evaluations)? {
            Evaluation::Done(residual) => residual,
            Evaluation::Failed(err) => {
                warn!("Evaluation of the initial guess failed: {}", err);
                let status = FitStatus::Aborted(AbortReason::EvaluationFailure(err.message));
                return Ok(self.finish(problem, status, 1, None, evaluations, trace));
            }
            Evaluation::Cancelled => {
                return Ok(self.finish(problem, FitStatus::Cancelled, 0, None, evaluations, trace));
            }
        };

        let norm = residual.norm;
        let mut record = IterationRecord::first(beta, residual);
        debug!("LMB iteration 1 (bootstrap): norm = {:.6e}", norm);
        self.push_trace(&mut trace, problem, 0, IterationState::Start, &record, norm, None);
        if norm < tol {
            info!("LMB converged after 1 iteration, norm = {:.6e}", norm);
            return Ok(self.finish(problem, FitStatus::Converged, 1, Some(&record), evaluations, trace));
        }

        let mut jacobian = BroydenJacobian::new(m, n);
        let mut last_step: Option<Array1<f64>> = None;

        for i in 1..max_iterations {
            let state = IterationState::at(i, n);

            let (candidate, lambda) = match state {
                IterationState::Start => (v0.clone(), None),
                IterationState::Probe(k) => {
                    let mut beta = record.beta_old.clone();
                    beta[k] = probe_value(k, v0[k], v1[k]);
                    (beta, None)
                }
                IterationState::Refine(k) => {
                    let lambda = self.config.damping.lambda(k);
                    let cap = match (self.config.max_step_ratio, last_step.as_ref()) {
                        (Some(ratio), Some(s)) => Some((ratio, s)),
                        _ => None,
                    };
                    match DampedStep::step(
                        &record.r_old,
                        &jacobian,
                        &record.beta_old,
                        lambda,
                        problem.weight(),
                        cap,
                    ) {
                        Ok(step) => {
                            let mut beta = step.beta;
                            problem.clamp(&mut beta);
                            (beta, Some(lambda))
                        }
                        Err(LmbOptError::LinearSystemFailure(msg)) => {
                            warn!("LMB aborted at iteration {}: {}", i + 1, msg);
                            let status =
                                FitStatus::Aborted(AbortReason::LinearSystemFailure(msg));
                            return Ok(self.finish(
                                problem,
                                status,
                                i,
                                Some(&record),
                                evaluations,
                                trace,
                            ));
                        }
                        Err(e) => return Err(e),
                    }
                }
            };

            let mut beta = candidate;
            let residual = match self.evaluate(problem, evaluator, &beta, &mut evaluations)? {
                Evaluation::Done(residual) => residual,
                Evaluation::Cancelled => {
                    return Ok(self.finish(
                        problem,
                        FitStatus::Cancelled,
                        i,
                        Some(&record),
                        evaluations,
                        trace,
                    ));
                }
                Evaluation::Failed(err) => {
                    warn!(
                        "Evaluation failed at iteration {} ({}), retrying with a shortened step",
                        i + 1,
                        err
                    );
                    let blend = self.config.retry_blend;
                    beta = &record.beta_old * (1.0 - blend) + &beta * blend;
                    if let IterationState::Refine(_) = state {
                        problem.clamp(&mut beta);
                    }
                    match self.evaluate(problem, evaluator, &beta, &mut evaluations)? {
                        Evaluation::Done(residual) => residual,
                        Evaluation::Cancelled => {
                            return Ok(self.finish(
                                problem,
                                FitStatus::Cancelled,
                                i,
                                Some(&record),
                                evaluations,
                                trace,
                            ));
                        }
                        Evaluation::Failed(err) => {
                            warn!("Retry failed at iteration {}: {}", i + 1, err);
                            let status =
                                FitStatus::Aborted(AbortReason::EvaluationFailure(err.message));
                            return Ok(self.finish(
                                problem,
                                status,
                                i + 1,
                                Some(&record),
                                evaluations,
                                trace,
                            ));
                        }
                    }
                }
            };

            let s = &beta - &record.beta_old;
            let t = &record.r_old - &residual.r;
            let norm = residual.norm;
            record.accept(beta, residual);

            debug!(
                "LMB iteration {} ({:?}): norm = {:.6e}, best = {:.6e}",
                i + 1,
                state.phase(),
                norm,
                record.best_norm
            );
            self.push_trace(&mut trace, problem, i, state, &record, norm, lambda);

            if norm < tol {
                info!("LMB converged after {} iterations, norm = {:.6e}", i + 1, norm);
                return Ok(self.finish(
                    problem,
                    FitStatus::Converged,
                    i + 1,
                    Some(&record),
                    evaluations,
                    trace,
                ));
            }

            match jacobian.update(&t, &s) {
                Ok(()) => {}
                Err(LmbOptError::DegenerateStep(_)) => {
                    warn!("Skipping Broyden update at iteration {}: zero step", i + 1);
                }
                Err(e) => return Err(e),
            }
            last_step = Some(s);
        }

        info!(
            "LMB reached maximum iterations ({}) without converging, best norm = {:.6e}",
            max_iterations, record.best_norm
        );
        Ok(self.finish(
            problem,
            FitStatus::Exhausted,
            max_iterations,
            Some(&record),
            evaluations,
            trace,
        ))
    }

    /// Evaluate unscaled `beta` unless the run was cancelled.
    fn evaluate<E: Evaluator + ?Sized>(
        &self,
        problem: &FitProblem,
        evaluator: &E,
        beta: &Array1<f64>,
        evaluations: &mut usize,
    ) -> Result<Evaluation> {
        if let Some(token) = &self.cancellation {
            if token.is_cancelled() {
                info!("LMB run cancelled");
                return Ok(Evaluation::Cancelled);
            }
        }

        *evaluations += 1;
        let physical = problem.to_physical(beta);
        match checked_evaluate(
            evaluator,
            problem.catalog(),
            &physical,
            problem.residual_count(),
        ) {
            Ok(f) => Ok(Evaluation::Done(compute_residual(&f, problem.reference())?)),
            Err(err) => Ok(Evaluation::Failed(err)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_trace(
        &self,
        trace: &mut Option<Vec<TraceEntry>>,
        problem: &FitProblem,
        iteration: usize,
        state: IterationState,
        record: &IterationRecord,
        norm: f64,
        lambda: Option<f64>,
    ) {
        if let Some(entries) = trace {
            entries.push(TraceEntry {
                iteration,
                phase: state.phase(),
                params: problem.to_physical(&record.beta_old),
                norm,
                best_norm: record.best_norm,
                lambda,
            });
        }
    }

    fn finish(
        &self,
        problem: &FitProblem,
        status: FitStatus,
        iterations: usize,
        record: Option<&IterationRecord>,
        evaluations: usize,
        trace: Option<Vec<TraceEntry>>,
    ) -> FitResult {
        let (norm, params, residuals) = match record {
            Some(record) => (
                record.best_norm,
                Some(problem.to_physical(&record.best_beta)),
                Some(record.best_r.clone()),
            ),
            None => (f64::INFINITY, None, None),
        };
        FitResult {
            norm,
            iterations,
            params,
            residuals,
            message: status.description(),
            status,
            evaluations,
            trace,
        }
    }
}
