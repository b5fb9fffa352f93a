//! Run configuration loadable from JSON.
//!
//! ```
//! use lmbopt_rs::config::{Method, OptimizerConfig};
//!
//! let config = OptimizerConfig::from_json(
//!     r#"{ "method": "combined", "max_iterations": 40, "combined": { "rounds": 2 } }"#,
//! )
//! .unwrap();
//! assert_eq!(config.method, Method::Combined);
//! assert_eq!(config.combined.rounds, 2);
//! assert_eq!(config.tol, 1e-6);
//! ```

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{LmbOptError, Result};
use crate::evaluator::Evaluator;
use crate::global_opt::{BayesianConfig, CombinedConfig};
use crate::lm::LmbConfig;
use crate::parameters::ParameterSet;
use crate::problem::FitOptions;
use crate::result::FitResult;

/// Which optimizer a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Local Levenberg-Marquardt-Broyden solver
    LevenbergMarquardtBroyden,

    /// Bayesian global search
    Bayesian,

    /// Global search alternated with local refinement
    Combined,
}

impl Default for Method {
    fn default() -> Self {
        Method::LevenbergMarquardtBroyden
    }
}

/// Everything needed to run a fit except the data and the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub method: Method,

    /// Iteration budget. Default: 50
    pub max_iterations: usize,

    /// Convergence threshold on the residual norm. Default: 1e-6
    pub tol: f64,

    /// Weight, scale and clamp overrides
    pub options: FitOptions,

    pub lmb: LmbConfig,
    pub bayesian: BayesianConfig,
    pub combined: CombinedConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            method: Method::default(),
            max_iterations: 50,
            tol: 1e-6,
            options: FitOptions::default(),
            lmb: LmbConfig::default(),
            bayesian: BayesianConfig::default(),
            combined: CombinedConfig::default(),
        }
    }
}

impl OptimizerConfig {
    /// Parse a configuration and check its values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_json(&contents)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the settings of the selected method.
    pub fn validate(&self) -> Result<()> {
        if self.tol.is_nan() {
            return Err(LmbOptError::InvalidParameter("tol is NaN".to_string()));
        }
        match self.method {
            Method::LevenbergMarquardtBroyden => self.lmb.validate(),
            Method::Bayesian => self.bayesian.validate(),
            Method::Combined => {
                self.combined.lmb.validate()?;
                self.combined.bayesian.validate()
            }
        }
    }

    /// Fit `parameters` to `y` with the configured method.
    pub fn run<E: Evaluator + ?Sized>(
        &self,
        y: Array1<f64>,
        parameters: &ParameterSet,
        evaluator: &E,
    ) -> Result<FitResult> {
        self.validate()?;
        match self.method {
            Method::LevenbergMarquardtBroyden => crate::levenberg_marquardt_broyden_with_config(
                y,
                parameters,
                evaluator,
                self.max_iterations,
                self.tol,
                &self.options,
                &self.lmb,
            ),
            Method::Bayesian => crate::global_search(
                y,
                parameters,
                evaluator,
                self.max_iterations,
                self.tol,
                &self.options,
                &self.bayesian,
            ),
            Method::Combined => crate::combined(
                y,
                parameters,
                evaluator,
                self.max_iterations,
                self.tol,
                &self.options,
                &self.combined,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EvaluationFailure;
    use crate::global_opt::{AcquisitionKind, Objective};
    use crate::lm::DampingSchedule;
    use ndarray::array;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = OptimizerConfig::from_json("{}").unwrap();
        assert_eq!(config, OptimizerConfig::default());
        assert_eq!(config.bayesian.init_points, 10);
        assert_eq!(config.combined.rounds, 4);
    }

    #[test]
    fn test_nested_settings() {
        let config = OptimizerConfig::from_json(
            r#"{
                "method": "bayesian",
                "tol": 1e-8,
                "options": { "weight": [1.0, 2.0] },
                "lmb": { "damping": { "kind": "geometric", "initial": 1.0, "factor": 0.5 } },
                "bayesian": { "acquisition": "ei", "xi": 0.01, "objective": "r_squared", "seed": 9 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.method, Method::Bayesian);
        assert_eq!(config.options.weight, Some(vec![1.0, 2.0]));
        assert_eq!(
            config.lmb.damping,
            DampingSchedule::Geometric { initial: 1.0, factor: 0.5 }
        );
        assert_eq!(config.bayesian.acquisition, AcquisitionKind::Ei);
        assert_eq!(config.bayesian.objective, Objective::RSquared);
        assert_eq!(config.bayesian.seed, Some(9));
    }

    #[test]
    fn test_round_trip() {
        let mut config = OptimizerConfig::default();
        config.method = Method::Combined;
        config.combined.global_iterations = Some(12);
        let back = OptimizerConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            OptimizerConfig::from_json(r#"{ "lmb": { "retry_blend": 2.0 } }"#),
            Err(LmbOptError::InvalidParameter(_))
        ));
        assert!(matches!(
            OptimizerConfig::from_json(r#"{ "method": "simplex" }"#),
            Err(LmbOptError::JsonError(_))
        ));
    }

    #[test]
    fn test_run_dispatches_on_method() {
        let mut params = ParameterSet::new();
        params.add_param("beta", 0.1, 0.9).unwrap();
        let model = |_: &ParameterSet, beta: &Array1<f64>| -> std::result::Result<Array1<f64>, EvaluationFailure> {
            Ok(array![1.0, 4.0, 9.0, 16.0].mapv(|x: f64| x.powf(beta[0])))
        };
        let y = array![1.0, 2.0, 3.0, 4.0];

        let local = OptimizerConfig::default().run(y.clone(), &params, &model).unwrap();
        assert!(local.success());

        let mut global = OptimizerConfig::default();
        global.method = Method::Bayesian;
        global.max_iterations = 6;
        global.tol = 0.0;
        global.bayesian.seed = Some(1);
        global.bayesian.n_warmup = 100;
        let result = global.run(y, &params, &model).unwrap();
        assert_eq!(result.iterations, 6);
    }
}
