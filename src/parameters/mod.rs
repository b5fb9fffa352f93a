//! # Parameter System
//!
//! Named model coefficients for the optimizers in this crate.
//!
//! ## Core Components
//!
//! - [`Parameter`]: one coefficient with two initial guesses, a scale, an
//!   optional refinement clamp and an optimize/constant flag
//! - [`ParameterSet`]: the ordered catalog handed to evaluators; its insertion
//!   order defines the layout of the solved vector β
//! - [`Bounds`]: closed intervals used for clamping and as global search boxes
//!
//! ## Example Usage
//!
//! ```rust
//! use lmbopt_rs::parameters::{Parameter, ParameterSet};
//!
//! let mut params = ParameterSet::new();
//!
//! // Two guesses for the local solver, also the global search box
//! params.add_param("exponent", 0.1, 0.9).unwrap();
//!
//! // Large coefficients are easier to solve for in normalized units
//! params
//!     .add(Parameter::new("enthalpy", -1.0, 1.0).unwrap().with_scale(1e4).unwrap())
//!     .unwrap();
//!
//! // Held constant and passed through to the evaluator
//! params.add_constant("offset", 0.25).unwrap();
//!
//! assert_eq!(params.optimized_count(), 2);
//! ```

pub mod bounds;
pub mod parameter;
pub mod parameter_set;


// Re-export key types
pub use bounds::{Bounds, BoundsError, BoundsRepair};
pub use parameter::{Parameter, ParameterError};
pub use parameter_set::{ParameterSet, SerializationError};
