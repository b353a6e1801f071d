//! Error types for the DUET installation

use thiserror::Error;

/// Core DUET errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DuetError {
    // Session errors
    #[error("Not enough training data: person 1 has {person1} poses, person 2 has {person2}, need more than {required} each")]
    InsufficientData {
        person1: usize,
        person2: usize,
        required: usize,
    },

    #[error("No trained model, record and train first")]
    NoModel,

    // Training errors
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl DuetError {
    /// Errors the user must be told about with a blocking notification
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            DuetError::InsufficientData { .. } | DuetError::NoModel | DuetError::TrainingFailed(_)
        )
    }
}

impl From<std::io::Error> for DuetError {
    fn from(err: std::io::Error) -> Self {
        DuetError::Io(err.to_string())
    }
}

/// Result type for DUET operations
pub type DuetResult<T> = Result<T, DuetError>;
