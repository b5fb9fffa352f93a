//! Outcome of an optimizer run.

use ndarray::Array1;
use std::fmt;

/// Why a run stopped before convergence or budget exhaustion.
#[derive(Debug, Clone, PartialEq)]
pub enum AbortReason {
    /// The evaluator failed on the first point, or twice in a row later on.
    EvaluationFailure(String),

    /// The damped normal equations could not be solved.
    LinearSystemFailure(String),
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum FitStatus {
    /// The norm fell below the tolerance.
    Converged,

    /// The iteration budget ran out.
    Exhausted,

    /// The run stopped early; the best result so far is reported.
    Aborted(AbortReason),

    /// The caller cancelled the run.
    Cancelled,

    /// No optimized parameters or no reference values; nothing was run.
    InvalidProblemSize,
}

impl FitStatus {
    pub fn is_converged(&self) -> bool {
        matches!(self, FitStatus::Converged)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, FitStatus::Aborted(_))
    }

    /// Returns a description of the status.
    pub fn description(&self) -> String {
        match self {
            FitStatus::Converged => "Converged".to_string(),
            FitStatus::Exhausted => {
                "Reached maximum iterations without converging".to_string()
            }
            FitStatus::Aborted(AbortReason::EvaluationFailure(msg)) => {
                format!("Aborted: evaluation failure ({})", msg)
            }
            FitStatus::Aborted(AbortReason::LinearSystemFailure(msg)) => {
                format!("Aborted: linear system failure ({})", msg)
            }
            FitStatus::Cancelled => "Cancelled".to_string(),
            FitStatus::InvalidProblemSize => {
                "No optimized parameters or no reference values".to_string()
            }
        }
    }
}

/// Which part of the local solver produced an iterate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Initial guesses and one-at-a-time probes
    Bootstrap,

    /// Damped quasi-Newton steps
    Refine,

    /// Sample drawn by the global search
    Global,
}

/// One accepted evaluation of a traced run.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    /// Zero-based iteration index
    pub iteration: usize,

    pub phase: Phase,

    /// Physical parameters passed to the evaluator
    pub params: Array1<f64>,

    /// Norm at `params`
    pub norm: f64,

    /// Best norm after this iteration
    pub best_norm: f64,

    /// Damping used to compute the step, refinement only
    pub lambda: Option<f64>,
}

/// Result of an optimizer run.
#[derive(Debug, Clone)]
pub struct FitResult {
    /// Best norm seen; infinite when nothing was evaluated successfully
    pub norm: f64,

    /// Iterations used
    pub iterations: usize,

    /// Best physical parameter vector, if any evaluation succeeded
    pub params: Option<Array1<f64>>,

    /// Scaled residuals at `params`
    pub residuals: Option<Array1<f64>>,

    pub status: FitStatus,

    /// Number of evaluator calls, retries included
    pub evaluations: usize,

    /// A message describing the result
    pub message: String,

    /// Per-iteration record, when requested
    pub trace: Option<Vec<TraceEntry>>,
}

impl FitResult {
    pub(crate) fn invalid_problem_size() -> Self {
        let status = FitStatus::InvalidProblemSize;
        Self {
            norm: f64::INFINITY,
            iterations: 0,
            params: None,
            residuals: None,
            message: status.description(),
            status,
            evaluations: 0,
            trace: None,
        }
    }

    /// Whether the run converged.
    pub fn success(&self) -> bool {
        self.status.is_converged()
    }

    /// `(norm, iterations, params)`.
    pub fn into_triple(self) -> (f64, usize, Option<Array1<f64>>) {
        (self.norm, self.iterations, self.params)
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fit Result:")?;
        writeln!(f, "  Status: {}", self.status.description())?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Norm: {:.6e}", self.norm)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Evaluations: {}", self.evaluations)?;
        match &self.params {
            Some(params) => writeln!(f, "  Parameters: {}", params)?,
            None => writeln!(f, "  Parameters: none")?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_invalid_problem_size_result() {
        let result = FitResult::invalid_problem_size();
        assert_eq!(result.iterations, 0);
        assert!(result.params.is_none());
        assert!(!result.success());
        assert!(result.norm.is_infinite());
    }

    #[test]
    fn test_display() {
        let result = FitResult {
            norm: 1e-8,
            iterations: 7,
            params: Some(array![0.5]),
            residuals: Some(array![10.0]),
            status: FitStatus::Converged,
            evaluations: 7,
            message: "Converged".to_string(),
            trace: None,
        };
        let text = format!("{}", result);
        assert!(text.contains("Iterations: 7"));
        assert!(text.contains("Converged"));
        assert_eq!(result.into_triple(), (1e-8, 7, Some(array![0.5])));
    }

    #[test]
    fn test_status_helpers() {
        let aborted = FitStatus::Aborted(AbortReason::EvaluationFailure("diverged".into()));
        assert!(aborted.is_aborted());
        assert!(!aborted.is_converged());
        assert!(aborted.description().contains("diverged"));
    }
}
