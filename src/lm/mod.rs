//! Levenberg-Marquardt-Broyden algorithm implementation.
//!
//! A derivative-free Levenberg-Marquardt solver: the Jacobian is replaced by
//! a Broyden secant approximation that is seeded with ones, filled in by a
//! one-parameter-at-a-time bootstrap, and refined after every evaluation.

pub mod algorithm;
pub mod broyden;
pub mod config;
pub mod status;
pub mod step;

// Re-export key types
pub use algorithm::LevenbergMarquardtBroyden;
pub use broyden::BroydenJacobian;
pub use config::{DampingSchedule, LmbConfig};
pub use status::{IterationRecord, IterationState};
pub use step::{DampedStep, StepResult, OVERFLOW_THRESHOLD};
