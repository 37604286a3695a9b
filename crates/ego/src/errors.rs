use std::time::Duration;

use thiserror::Error;

use crate::OptimResult;

/// A result type for moego optimization
pub type Result<T> = std::result::Result<T, EgoError>;

/// An error for surrogate-assisted multi-objective optimization
#[derive(Error, Debug)]
pub enum EgoError {
    /// When a variable descriptor or the variable space is malformed
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),
    /// When the evaluation of a design point fails
    #[error("Evaluation failure: {0}")]
    EvaluationFailure(String),
    /// When a surrogate cannot be fitted for lack of training points
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    /// When the evaluation of a design point exceeds its time bound
    #[error("Evaluation timeout after {0:?}")]
    Timeout(Duration),
    /// When the run is stopped by its cancellation token, holds the partial result
    #[error("Optimization cancelled after {} evaluation(s)", .0.archive.len())]
    Cancelled(Box<OptimResult>),
    /// When configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfigError(String),
    /// When an invalid value is encountered
    #[error("Value error: {0}")]
    InvalidValue(String),
    /// When GP fitting or prediction fails
    #[error("GP error")]
    GpError(#[from] moego_gp::GpError),
}

impl EgoError {
    /// Whether the error is an evaluation outcome absorbed by the optimizer as a failed record
    pub fn is_evaluation_failure(&self) -> bool {
        matches!(self, EgoError::EvaluationFailure(_) | EgoError::Timeout(_))
    }
}
