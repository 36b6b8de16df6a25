//! Error types for the calcwire core library.

use thiserror::Error;

pub use crate::eval::EvalError;

/// Error type for loading configuration.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration could not be parsed or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure classes reported to peers as `{"ok": false, "error": ...}`.
///
/// The `Display` form is exactly the wire `error` string,
/// `"<classification>: <detail>"`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// A frame was not valid JSON.
    #[error("Malformed: {0}")]
    Malformed(String),

    /// A required field is missing or mistyped, or the mode is unknown.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The expression could not be evaluated.
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvalError),

    /// The upstream server could not be reached or did not answer.
    #[error("Upstream error: {0}")]
    Upstream(String),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, CoreError>;
