//! Ordered parameter catalog
//!
//! [`ParameterSet`] keeps parameters in insertion order. That order is the
//! order of the solved vector β, of the scale vector and of the bounds for the
//! whole lifetime of a run, and it is the only place where a parameter name is
//! translated to an index (or back).

use crate::parameters::bounds::Bounds;
use crate::parameters::parameter::{Parameter, ParameterError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Error type for saving/loading a parameter set.
#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Wire representation, validated on the way in.
#[derive(Serialize, Deserialize)]
struct ParameterList {
    parameters: Vec<Parameter>,
}

/// A collection of named parameters in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParameterList", into = "ParameterList")]
pub struct ParameterSet {
    params: Vec<Parameter>,
}

impl TryFrom<ParameterList> for ParameterSet {
    type Error = ParameterError;

    fn try_from(list: ParameterList) -> Result<Self, Self::Error> {
        let mut set = ParameterSet::new();
        for param in list.parameters {
            param.validate()?;
            set.add(param)?;
        }
        Ok(set)
    }
}

impl From<ParameterSet> for ParameterList {
    fn from(set: ParameterSet) -> Self {
        ParameterList {
            parameters: set.params,
        }
    }
}

impl ParameterSet {
    /// Create a new empty parameter set
    ///
    /// # Examples
    ///
    /// ```
    /// use lmbopt_rs::parameters::ParameterSet;
    ///
    /// let params = ParameterSet::new();
    /// assert!(params.is_empty());
    /// ```
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Append a parameter. Names must be unique.
    pub fn add(&mut self, param: Parameter) -> Result<(), ParameterError> {
        if self.contains(param.name()) {
            return Err(ParameterError::DuplicateName {
                name: param.name().to_string(),
            });
        }
        self.params.push(param);
        Ok(())
    }

    /// Append an optimized parameter with two initial guesses.
    ///
    /// # Examples
    ///
    /// ```
    /// use lmbopt_rs::parameters::ParameterSet;
    ///
    /// let mut params = ParameterSet::new();
    /// params.add_param("a", 0.0, 1.0).unwrap();
    /// params.add_constant("b", 2.0).unwrap();
    /// params.add_param("c", -1.0, 1.0).unwrap();
    ///
    /// assert_eq!(params.optimized_names(), vec!["a", "c"]);
    /// assert_eq!(params.index_of("c"), Some(1));
    /// assert_eq!(params.index_of("b"), None);
    /// ```
    pub fn add_param(&mut self, name: &str, v0: f64, v1: f64) -> Result<(), ParameterError> {
        self.add(Parameter::new(name, v0, v1)?)
    }

    /// Append a parameter held at a fixed value.
    pub fn add_constant(&mut self, name: &str, value: f64) -> Result<(), ParameterError> {
        self.add(Parameter::constant(name, value)?)
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params.iter_mut().find(|p| p.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    /// Parameters the optimizer solves for, in β order.
    pub fn optimized(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| p.optimize())
    }

    pub fn optimized_count(&self) -> usize {
        self.optimized().count()
    }

    pub fn optimized_names(&self) -> Vec<&str> {
        self.optimized().map(|p| p.name()).collect()
    }

    /// Position of an optimized parameter inside β.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.optimized().position(|p| p.name() == name)
    }

    /// Constant substitutions `(name, physical value)` in insertion order.
    pub fn constants(&self) -> Vec<(&str, f64)> {
        self.params
            .iter()
            .filter(|p| !p.optimize())
            .map(|p| (p.name(), p.fixed_value()))
            .collect()
    }

    /// First and second initial guesses of the optimized parameters (unscaled).
    pub fn initial_guesses(&self) -> (Array1<f64>, Array1<f64>) {
        let v0 = self.optimized().map(|p| p.initial().0).collect();
        let v1 = self.optimized().map(|p| p.initial().1).collect();
        (v0, v1)
    }

    /// Scale factors of the optimized parameters.
    pub fn scales(&self) -> Array1<f64> {
        self.optimized().map(|p| p.scale()).collect()
    }

    /// Refinement clamps of the optimized parameters (unscaled).
    pub fn clamp_bounds(&self) -> Vec<Option<Bounds>> {
        self.optimized().map(|p| p.bounds()).collect()
    }

    /// Expand a physical β into the full `(name, value)` list, constants included.
    ///
    /// # Examples
    ///
    /// ```
    /// use lmbopt_rs::parameters::ParameterSet;
    /// use ndarray::array;
    ///
    /// let mut params = ParameterSet::new();
    /// params.add_param("a", 0.0, 1.0).unwrap();
    /// params.add_constant("b", 2.0).unwrap();
    ///
    /// let values = params.assemble(&array![0.5]).unwrap();
    /// assert_eq!(values, vec![("a".to_string(), 0.5), ("b".to_string(), 2.0)]);
    /// ```
    pub fn assemble(&self, beta: &Array1<f64>) -> Result<Vec<(String, f64)>, ParameterError> {
        let expected = self.optimized_count();
        if beta.len() != expected {
            return Err(ParameterError::LengthMismatch {
                expected,
                actual: beta.len(),
            });
        }

        let mut solved = beta.iter();
        let values = self
            .params
            .iter()
            .map(|p| {
                let value = if p.optimize() {
                    // Lengths were checked above
                    *solved.next().unwrap_or(&f64::NAN)
                } else {
                    p.fixed_value()
                };
                (p.name().to_string(), value)
            })
            .collect();

        Ok(values)
    }

    /// Save the parameter set to a JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), SerializationError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Serialize the parameter set to a JSON string
    pub fn to_json(&self) -> Result<String, SerializationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a parameter set from a JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, SerializationError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_json(&contents)
    }

    /// Load a parameter set from a JSON string
    ///
    /// # Examples
    ///
    /// ```
    /// use lmbopt_rs::parameters::ParameterSet;
    ///
    /// let json = r#"{
    ///   "parameters": [
    ///     { "name": "L0", "initial": [-10.0, 10.0], "scale": 1000.0 },
    ///     { "name": "L1", "initial": [2.5, 2.5], "optimize": false }
    ///   ]
    /// }"#;
    ///
    /// let params = ParameterSet::from_json(json).unwrap();
    /// assert_eq!(params.len(), 2);
    /// assert_eq!(params.optimized_count(), 1);
    /// assert_eq!(params.get("L0").unwrap().scale(), 1000.0);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, SerializationError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> ParameterSet {
        let mut params = ParameterSet::new();
        params.add_param("z", 1.0, 2.0).unwrap();
        params.add_constant("fixed", 4.0).unwrap();
        params
            .add(
                Parameter::new("a", -1.0, 1.0)
                    .unwrap()
                    .with_scale(10.0)
                    .unwrap()
                    .with_bounds(-2.0, 2.0)
                    .unwrap(),
            )
            .unwrap();
        params
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let params = sample();
        let names: Vec<&str> = params.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["z", "fixed", "a"]);
        assert_eq!(params.optimized_names(), vec!["z", "a"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut params = sample();
        let err = params.add_param("z", 0.0, 1.0).unwrap_err();
        assert_eq!(err, ParameterError::DuplicateName { name: "z".into() });
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_solve_vectors() {
        let params = sample();
        let (v0, v1) = params.initial_guesses();
        assert_eq!(v0, array![1.0, -1.0]);
        assert_eq!(v1, array![2.0, 1.0]);
        assert_eq!(params.scales(), array![1.0, 10.0]);

        let clamps = params.clamp_bounds();
        assert!(clamps[0].is_none());
        assert_eq!(clamps[1], Some(Bounds::new(-2.0, 2.0).unwrap()));

        assert_eq!(params.constants(), vec![("fixed", 4.0)]);
    }

    #[test]
    fn test_assemble() {
        let params = sample();
        let values = params.assemble(&array![1.5, -20.0]).unwrap();
        assert_eq!(
            values,
            vec![
                ("z".to_string(), 1.5),
                ("fixed".to_string(), 4.0),
                ("a".to_string(), -20.0)
            ]
        );

        let err = params.assemble(&array![1.0]).unwrap_err();
        assert_eq!(
            err,
            ParameterError::LengthMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_json_round_trip() {
        let params = sample();
        let json = params.to_json().unwrap();
        let back = ParameterSet::from_json(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_json_rejects_duplicates() {
        let json = r#"{"parameters":[
            {"name":"a","initial":[0.0,1.0]},
            {"name":"a","initial":[0.0,1.0]}
        ]}"#;
        assert!(ParameterSet::from_json(json).is_err());
    }
}
