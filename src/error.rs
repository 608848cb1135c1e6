use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Invalid parameter for {transform}: {reason}")]
    InvalidParameter {
        transform: &'static str,
        reason: String,
    },

    #[error("{transform} expects a {expected} buffer, got {actual}")]
    DimensionMismatch {
        transform: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
}

impl PipelineError {
    pub(crate) fn invalid(transform: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            transform,
            reason: reason.into(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
