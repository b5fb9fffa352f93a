//! Candidate scoring for acquisition maximization.
//!
//! Scoring is pure computation on the surrogate (the evaluator is never
//! called here), so with the `parallel` feature it is spread over the rayon
//! thread pool.

use ndarray::Array1;
use rand::Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::global_opt::acquisition::AcquisitionFunction;
use crate::global_opt::gaussian_process::GaussianProcess;

/// Score every candidate (unit-cube coordinates).
///
/// # Arguments
///
/// * `gp` - Fitted surrogate
/// * `acquisition` - Acquisition function to evaluate
/// * `candidates` - Points to score
/// * `y_max` - Best registered target
///
/// # Returns
///
/// * One score per candidate, in order
pub fn score_candidates(
    gp: &GaussianProcess,
    acquisition: &AcquisitionFunction,
    candidates: &[Array1<f64>],
    y_max: f64,
) -> Vec<f64> {
    let score = |x: &Array1<f64>| {
        let (mean, std) = gp.predict(x);
        acquisition.evaluate(mean, std, y_max)
    };

    #[cfg(feature = "parallel")]
    {
        candidates.par_iter().map(score).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        candidates.iter().map(score).collect()
    }
}

/// Index and value of the best finite score.
pub fn best_candidate(scores: &[f64]) -> Option<(usize, f64)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .fold(None, |best, (i, s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
}

/// `count` uniform random points inside `[low, high]` per dimension.
pub fn random_candidates(
    low: &Array1<f64>,
    high: &Array1<f64>,
    count: usize,
    rng: &mut impl Rng,
) -> Vec<Array1<f64>> {
    (0..count)
        .map(|_| {
            low.iter()
                .zip(high.iter())
                .map(|(&l, &h)| if h > l { rng.gen_range(l..h) } else { l })
                .collect()
        })
        .collect()
}
