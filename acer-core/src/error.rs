//! Errors in the library.
use thiserror::Error;

/// Errors raised by the building blocks of the agent.
#[derive(Error, Debug)]
pub enum AcerError {
    /// A key was not found in a [`Record`](crate::record::Record).
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// A value in a [`Record`](crate::record::Record) has an unexpected type.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// Arrays or tensors with inconsistent shapes were given.
    #[error("Shape mismatch in {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// What was being checked.
        what: String,
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        actual: Vec<usize>,
    },

    /// Samples were requested from a replay buffer holding too few steps.
    #[error("Replay buffer holds {available} steps per environment, {required} required")]
    BufferUnderfilled {
        /// Steps per environment required for sampling.
        required: usize,
        /// Steps per environment held by the buffer.
        available: usize,
    },

    /// A configuration value is out of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AcerError {
    /// Shorthand for [`AcerError::ShapeMismatch`].
    pub fn shape_mismatch(what: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}
