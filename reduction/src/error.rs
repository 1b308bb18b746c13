//! Error taxonomy for the reduction core.
//!
//! Only argument-level and resource-level problems are errors. Three outcomes
//! that look like failures are ordinary values instead:
//!
//! - an empty [`DetectedSet`](crate::image_proc::detection::DetectedSet) when
//!   no object is found,
//! - [`PlaneOffset::INVALID`](crate::registration::PlaneOffset::INVALID) when a
//!   plane does not correlate,
//! - zero-filled pixels when a resampling source falls outside the image.

use thiserror::Error;

/// Errors produced by the reduction core.
#[derive(Error, Debug)]
pub enum ReductionError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Only {found} anchor points found ({required} required) after {attempts} attempt(s)")]
    InsufficientAnchorPoints {
        found: usize,
        required: usize,
        attempts: usize,
    },

    #[error("{operation} gave up after {iterations} iterations")]
    ResourceExhaustion {
        operation: &'static str,
        iterations: usize,
    },

    #[error("No valid measurement: {0}")]
    NoValidMeasurement(String),

    #[error("Unknown {kind} name: '{name}'")]
    UnknownName { kind: &'static str, name: String },

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl ReductionError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ReductionError::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ReductionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ReductionError::InsufficientAnchorPoints {
            found: 0,
            required: 3,
            attempts: 4,
        };
        assert_eq!(
            err.to_string(),
            "Only 0 anchor points found (3 required) after 4 attempt(s)"
        );

        let err = ReductionError::ResourceExhaustion {
            operation: "slit erosion",
            iterations: 1024,
        };
        assert!(err.to_string().contains("1024"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ReductionError = io.into();
        assert!(matches!(err, ReductionError::Io(_)));
    }
}
