use thiserror::Error;

/// Error types for the lmbopt-rs library.
#[derive(Error, Debug)]
pub enum LmbOptError {
    /// Error indicating a mismatch in vector or matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The damped normal equations could not be solved.
    #[error("Linear system failure: {0}")]
    LinearSystemFailure(String),

    /// A secant update was requested with a zero-length (or non-finite) step.
    #[error("Degenerate Broyden step: {0}")]
    DegenerateStep(String),

    /// Error for invalid parameter values.
    #[error("Invalid parameter value: {0}")]
    InvalidParameter(String),

    /// Error for parameter-related problems.
    #[error("Parameter error: {0}")]
    ParameterError(String),

    /// Error for boundary constraint violations.
    #[error("Bounds error: {0}")]
    BoundsError(String),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Linear algebra error outside the step solve (surrogate model fitting).
    #[error("Linear algebra error: {0}")]
    LinearAlgebraError(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<crate::parameters::parameter::ParameterError> for LmbOptError {
    fn from(err: crate::parameters::parameter::ParameterError) -> Self {
        LmbOptError::ParameterError(format!("{}", err))
    }
}

impl From<crate::parameters::bounds::BoundsError> for LmbOptError {
    fn from(err: crate::parameters::bounds::BoundsError) -> Self {
        LmbOptError::BoundsError(format!("{}", err))
    }
}

impl From<crate::parameters::parameter_set::SerializationError> for LmbOptError {
    fn from(err: crate::parameters::parameter_set::SerializationError) -> Self {
        use crate::parameters::parameter_set::SerializationError;
        match err {
            SerializationError::IoError(e) => LmbOptError::IoError(e),
            SerializationError::JsonError(e) => LmbOptError::JsonError(e),
        }
    }
}

/// Result type alias for lmbopt-rs operations.
pub type Result<T> = std::result::Result<T, LmbOptError>;
