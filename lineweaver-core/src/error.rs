//! # Error Module
//!
//! Error types shared by every part of the annotator core. Each variant is
//! meant to be shown to the user as-is, so messages name the offending key or
//! position rather than an internal code path.

use thiserror::Error;

use crate::literal::LiteralError;

/// Common result type for annotator operations.
pub type Result<T> = std::result::Result<T, AnnotatorError>;

#[derive(Error, Debug)]
pub enum AnnotatorError {
    /// The uploaded text is not a valid literal structure.
    #[error("Parse error: {0}")]
    Literal(#[from] LiteralError),

    /// A required mapping key is absent.
    #[error("Missing key '{0}'")]
    MissingKey(String),

    /// The structure parsed but does not have the expected shape.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Length mismatch: {what} has {left} and {right} entries")]
    LengthMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },

    /// The requested operation is declared but not provided by this backend.
    #[error("Not implemented: {0}")]
    Unsupported(String),

    #[error("Fit failed: {0}")]
    Fit(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
