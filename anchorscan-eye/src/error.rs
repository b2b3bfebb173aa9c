//! Error types for anchorscan-eye

use anchorscan_core::Error as CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    /// The recognizer could not be started for a frame
    #[error("Submission error: {0}")]
    Submission(String),

    /// The recognizer started but failed internally
    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Recognition timed out after {0} ms")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The pipeline or one of its collaborators went away mid-operation
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<ScanError> for CoreError {
    fn from(err: ScanError) -> Self {
        CoreError::Pipeline(format!("Scan error: {}", err))
    }
}
