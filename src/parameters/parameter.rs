//! Parameter definition and implementation
//!
//! A [`Parameter`] is one named coefficient of the black-box model. It carries
//! two initial guesses, a multiplicative scale, an optional clamp and a flag
//! that decides whether the optimizer solves for it or holds it constant.

use crate::parameters::bounds::{Bounds, BoundsError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Parameter '{name}' already exists")]
    DuplicateName { name: String },

    #[error("Parameter '{name}' has invalid scale {scale}: scale must be positive and finite")]
    InvalidScale { name: String, scale: f64 },

    #[error("Parameter '{name}' has a non-finite initial guess")]
    NonFiniteGuess { name: String },

    #[error("Parameter '{name}' not found")]
    ParameterNotFound { name: String },

    #[error("Expected {expected} values for the optimized parameters, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Bounds error: {0}")]
    BoundsError(#[from] BoundsError),
}

fn default_scale() -> f64 {
    1.0
}

fn default_optimize() -> bool {
    true
}

/// A named model coefficient.
///
/// `initial.0` and `initial.1` are the two starting guesses of the local
/// solver and, at the same time, the lower and upper ends of the global
/// search box. Both are given in unscaled units: the evaluator always sees
/// `value * scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Name of the parameter
    name: String,

    /// First and second initial guess (unscaled)
    initial: (f64, f64),

    /// Multiplicative normalization applied before evaluation
    #[serde(default = "default_scale")]
    scale: f64,

    /// Whether the optimizer solves for this parameter
    #[serde(default = "default_optimize")]
    optimize: bool,

    /// Clamp applied to refinement steps (unscaled)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bounds: Option<Bounds>,
}

impl Parameter {
    /// Create a new optimized parameter with two initial guesses.
    ///
    /// # Examples
    ///
    /// ```
    /// use lmbopt_rs::parameters::Parameter;
    ///
    /// let param = Parameter::new("exponent", 0.1, 0.9).unwrap();
    /// assert_eq!(param.name(), "exponent");
    /// assert_eq!(param.initial(), (0.1, 0.9));
    /// assert_eq!(param.scale(), 1.0);
    /// assert!(param.optimize());
    /// ```
    pub fn new(name: &str, v0: f64, v1: f64) -> Result<Self, ParameterError> {
        if !v0.is_finite() || !v1.is_finite() {
            return Err(ParameterError::NonFiniteGuess {
                name: name.to_string(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            initial: (v0, v1),
            scale: 1.0,
            optimize: true,
            bounds: None,
        })
    }

    /// Create a parameter that is held at `value` and never solved for.
    pub fn constant(name: &str, value: f64) -> Result<Self, ParameterError> {
        let mut param = Self::new(name, value, value)?;
        param.optimize = false;
        Ok(param)
    }

    /// Set the scale factor (builder style).
    pub fn with_scale(mut self, scale: f64) -> Result<Self, ParameterError> {
        self.set_scale(scale)?;
        Ok(self)
    }

    /// Set the refinement clamp (builder style).
    pub fn with_bounds(mut self, min: f64, max: f64) -> Result<Self, ParameterError> {
        self.bounds = Some(Bounds::new(min, max)?);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial(&self) -> (f64, f64) {
        self.initial
    }

    /// Replace both initial guesses.
    pub fn set_initial(&mut self, v0: f64, v1: f64) -> Result<(), ParameterError> {
        if !v0.is_finite() || !v1.is_finite() {
            return Err(ParameterError::NonFiniteGuess {
                name: self.name.clone(),
            });
        }
        self.initial = (v0, v1);
        Ok(())
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f64) -> Result<(), ParameterError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(ParameterError::InvalidScale {
                name: self.name.clone(),
                scale,
            });
        }
        self.scale = scale;
        Ok(())
    }

    pub fn optimize(&self) -> bool {
        self.optimize
    }

    pub fn set_optimize(&mut self, optimize: bool) {
        self.optimize = optimize;
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Option<Bounds>) {
        self.bounds = bounds;
    }

    /// Physical value used for a constant parameter.
    pub fn fixed_value(&self) -> f64 {
        self.initial.0 * self.scale
    }

    /// Check invariants that deserialization cannot enforce on its own.
    pub(crate) fn validate(&self) -> Result<(), ParameterError> {
        if !self.initial.0.is_finite() || !self.initial.1.is_finite() {
            return Err(ParameterError::NonFiniteGuess {
                name: self.name.clone(),
            });
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(ParameterError::InvalidScale {
                name: self.name.clone(),
                scale: self.scale,
            });
        }
        Ok(())
    }
}
