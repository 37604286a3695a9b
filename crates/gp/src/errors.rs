use thiserror::Error;

/// A result type for GP regression algorithm
pub type Result<T> = std::result::Result<T, GpError>;

/// An error when using [`GaussianProcess`](crate::GaussianProcess) algorithm
#[derive(Error, Debug)]
pub enum GpError {
    /// When likelihood computation fails
    #[error("Likelihood computation error: {0}")]
    LikelihoodComputationError(String),
    /// When linear algebra computation fails
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
    /// When a linfa error occurs
    #[error(transparent)]
    LinfaError(#[from] linfa::error::Error),
    /// When there is not enough training points to fit a model
    #[error("Insufficient data: {n_samples} training point(s), at least 2 required")]
    InsufficientData {
        /// Number of training points given
        n_samples: usize,
    },
    /// When error due to a bad value
    #[error("InvalidValue error: {0}")]
    InvalidValueError(String),
}
