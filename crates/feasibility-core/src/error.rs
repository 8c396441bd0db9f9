use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeasibilityError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Malformed entry at index {index}: {reason}")]
    MalformedEntry { index: usize, reason: String },

    #[error("Convergence failure: {function} after {iterations} iterations — {reason}")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        reason: String,
    },

    #[error("Job dispatch failed: {0}")]
    Dispatch(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl FeasibilityError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        FeasibilityError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for FeasibilityError {
    fn from(e: serde_json::Error) -> Self {
        FeasibilityError::SerializationError(e.to_string())
    }
}
