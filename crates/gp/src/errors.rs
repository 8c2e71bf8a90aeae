use thiserror::Error;

/// A result type for approximate GP regression algorithms
pub type Result<T> = std::result::Result<T, GpError>;

/// An error when using one of the [`GaussianProcess`](crate::GaussianProcess),
/// [`SparseGaussianProcess`](crate::SparseGaussianProcess) or
/// [`RffGaussianProcess`](crate::RffGaussianProcess) algorithms
#[derive(Error, Debug)]
pub enum GpError {
    /// When an operation requiring a fitted model is called on an unfitted instance
    #[error("NotFitted error: {0} must be fitted first")]
    NotFitted(String),
    /// When feature dimensions are inconsistent between two point sets
    /// or between fit and predict/transform inputs
    #[error("DimensionMismatch error: {0}")]
    DimensionMismatch(String),
    /// When a required factorization fails numerically
    #[error("SingularMatrix error: {0}")]
    SingularMatrix(String),
    /// When a hyperparameter is out of its valid range
    #[error("InvalidHyperparameter error: {0}")]
    InvalidHyperparameter(String),
    /// When training data are empty or hold non finite values
    #[error("InvalidData error: {0}")]
    InvalidData(String),
    /// When linear algebra computation fails
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
    /// When an array cannot be reshaped
    #[error(transparent)]
    ShapeError(#[from] ndarray::ShapeError),
    /// When a linfa error occurs
    #[error(transparent)]
    LinfaError(#[from] linfa::error::Error),
    /// When error during saving
    #[cfg(feature = "persistent")]
    #[error("Save error: {0}")]
    SaveError(#[from] serde_json::Error),
    /// When error during loading
    #[error("Load IO error")]
    LoadIoError(#[from] std::io::Error),
}
