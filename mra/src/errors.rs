use thiserror::Error;

/// A result type for MRA algorithm
pub type Result<T> = std::result::Result<T, MraError>;

/// An error when building or using an [`MraTree`](crate::MraTree)
#[derive(Error, Debug)]
pub enum MraError {
    /// When tree shape parameters or input data are invalid
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    /// When a tree operation is called in the wrong state
    #[error("Precondition error: {0}")]
    PreconditionError(String),
    /// When a solve fails to produce finite values even once regularized
    #[error("Arithmetic failure: {0}")]
    ArithmeticFailure(String),
    /// When linear algebra computation fails
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
    /// When a linfa error occurs
    #[error(transparent)]
    LinfaError(#[from] linfa::error::Error),
}
