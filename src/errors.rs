use thiserror::Error;

/// A result type for acquisition optimization errors
pub type Result<T> = std::result::Result<T, AcqError>;

/// An error raised by the acquisition optimization engine
#[derive(Error, Debug)]
pub enum AcqError {
    /// When configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfigError(String),
    /// When an optimizer is selected for an incompatible acquisition criterion
    #[error("Optimizer misuse: {0}")]
    OptimizerMisuseError(String),
    /// When linear algebra computation fails
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
    /// When an invalid value is encountered
    #[error("Value error: {0}")]
    InvalidValueError(String),
}
