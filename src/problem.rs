//! Problem definition shared by all optimizers.
//!
//! A [`FitProblem`] is the validated snapshot of one fitting task: the
//! reference values, the residual weights, and the per-parameter guesses,
//! scales and clamps of the optimized parameters. Every optimizer run owns
//! its own snapshot, so concurrent runs never share mutable state.

use log::warn;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{LmbOptError, Result};
use crate::parameters::{Bounds, BoundsRepair, ParameterSet};

/// Optional per-run overrides.
///
/// Absent fields fall back to the defaults: unit weights, the scale stored on
/// each parameter, and the clamp stored on each parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// One non-negative weight per reference value
    pub weight: Option<Vec<f64>>,

    /// One positive scale factor per optimized parameter
    pub scale: Option<Vec<f64>>,

    /// One `[low, high]` clamp per optimized parameter (unscaled)
    pub bounds: Option<Vec<(f64, f64)>>,
}

impl FitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weight(mut self, weight: Vec<f64>) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_scale(mut self, scale: Vec<f64>) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_bounds(mut self, bounds: Vec<(f64, f64)>) -> Self {
        self.bounds = Some(bounds);
        self
    }
}

/// Validated fitting task.
#[derive(Debug, Clone)]
pub struct FitProblem {
    catalog: ParameterSet,
    reference: Array1<f64>,
    weight: Array1<f64>,
    scale: Array1<f64>,
    initial: (Array1<f64>, Array1<f64>),
    clamp: Vec<Option<Bounds>>,
}

impl FitProblem {
    /// Build a problem from reference values, a parameter catalog and overrides.
    ///
    /// An empty catalog or empty reference vector is accepted here; the
    /// optimizers report it as an invalid problem size without iterating.
    ///
    /// # Errors
    ///
    /// * `DimensionMismatch` if an override has the wrong length
    /// * `InvalidInput` for negative or non-finite weights or non-finite references
    /// * `ParameterError` for non-positive scales
    /// * `BoundsError` for reversed clamp bounds
    pub fn new(reference: Array1<f64>, catalog: &ParameterSet, options: &FitOptions) -> Result<Self> {
        let m = reference.len();
        if reference.iter().any(|v| !v.is_finite()) {
            return Err(LmbOptError::InvalidInput(
                "reference values must be finite".to_string(),
            ));
        }

        let weight = match &options.weight {
            Some(w) => {
                if w.len() != m {
                    return Err(LmbOptError::DimensionMismatch(format!(
                        "Expected {} weights, got {}",
                        m,
                        w.len()
                    )));
                }
                if w.iter().any(|v| !v.is_finite() || *v < 0.0) {
                    return Err(LmbOptError::InvalidInput(
                        "weights must be finite and non-negative".to_string(),
                    ));
                }
                Array1::from_vec(w.clone())
            }
            None => Array1::ones(m),
        };

        let mut catalog = catalog.clone();
        let names: Vec<String> = catalog
            .optimized_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let n = names.len();

        if let Some(scale) = &options.scale {
            if scale.len() != n {
                return Err(LmbOptError::DimensionMismatch(format!(
                    "Expected {} scale factors, got {}",
                    n,
                    scale.len()
                )));
            }
            for (name, &s) in names.iter().zip(scale.iter()) {
                if let Some(param) = catalog.get_mut(name) {
                    param.set_scale(s)?;
                }
            }
        }

        let clamp = match &options.bounds {
            Some(bounds) => {
                if bounds.len() != n {
                    return Err(LmbOptError::DimensionMismatch(format!(
                        "Expected {} bounds, got {}",
                        n,
                        bounds.len()
                    )));
                }
                bounds
                    .iter()
                    .map(|&(low, high)| Bounds::new(low, high).map(Some))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => catalog.clamp_bounds(),
        };

        let scale = catalog.scales();
        let initial = catalog.initial_guesses();

        Ok(Self {
            catalog,
            reference,
            weight,
            scale,
            initial,
            clamp,
        })
    }

    /// Number of reference values (m).
    pub fn residual_count(&self) -> usize {
        self.reference.len()
    }

    /// Number of optimized parameters (n).
    pub fn parameter_count(&self) -> usize {
        self.scale.len()
    }

    /// True when there is nothing to fit.
    pub fn is_empty(&self) -> bool {
        self.residual_count() == 0 || self.parameter_count() == 0
    }

    pub fn catalog(&self) -> &ParameterSet {
        &self.catalog
    }

    pub fn reference(&self) -> &Array1<f64> {
        &self.reference
    }

    pub fn weight(&self) -> &Array1<f64> {
        &self.weight
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    /// First and second initial guesses (unscaled).
    pub fn initial(&self) -> (&Array1<f64>, &Array1<f64>) {
        (&self.initial.0, &self.initial.1)
    }

    pub fn clamp_bounds(&self) -> &[Option<Bounds>] {
        &self.clamp
    }

    /// Unscaled → physical.
    pub fn to_physical(&self, beta: &Array1<f64>) -> Array1<f64> {
        beta * &self.scale
    }

    /// Physical → unscaled.
    pub fn to_unscaled(&self, physical: &Array1<f64>) -> Array1<f64> {
        physical / &self.scale
    }

    /// Clip every component with a clamp into its interval.
    pub fn clamp(&self, beta: &mut Array1<f64>) {
        for (value, bounds) in beta.iter_mut().zip(self.clamp.iter()) {
            if let Some(bounds) = bounds {
                *value = bounds.clamp(*value);
            }
        }
    }

    /// Same problem with both initial guesses set to `beta` (unscaled).
    pub fn with_initial_guess(&self, beta: &Array1<f64>) -> Result<Self> {
        if beta.len() != self.parameter_count() {
            return Err(LmbOptError::DimensionMismatch(format!(
                "Expected {} initial values, got {}",
                self.parameter_count(),
                beta.len()
            )));
        }
        let mut seeded = self.clone();
        seeded.initial = (beta.clone(), beta.clone());
        Ok(seeded)
    }

    /// Global search box in physical units, repaired where malformed.
    pub fn search_bounds(&self) -> Vec<Bounds> {
        let names = self.catalog.optimized_names();
        (0..self.parameter_count())
            .map(|i| {
                let low = self.initial.0[i] * self.scale[i];
                let high = self.initial.1[i] * self.scale[i];
                let (bounds, repair) = Bounds::repaired(low, high);
                match repair {
                    Some(BoundsRepair::Swapped) => warn!(
                        "Search bounds for '{}' were reversed, swapping to [{}, {}]",
                        names[i], bounds.min, bounds.max
                    ),
                    Some(BoundsRepair::Widened) => warn!(
                        "Search bounds for '{}' were empty, widening to [{}, {}]",
                        names[i], bounds.min, bounds.max
                    ),
                    _ => {}
                }
                match bounds.narrowed() {
                    Some(narrowed) => {
                        warn!(
                            "Search bounds for '{}' are too wide to sample, narrowing to [{}, {}]",
                            names[i], narrowed.min, narrowed.max
                        );
                        narrowed
                    }
                    None => bounds,
                }
            })
            .collect()
    }
}
