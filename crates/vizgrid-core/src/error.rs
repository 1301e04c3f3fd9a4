//! Error types for vizgrid-core

use thiserror::Error;

use crate::value::ColumnType;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by user-supplied calculated column functions
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in vizgrid-core
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid construction input or view configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A value does not fit the column's declared type
    #[error("Type mismatch in column {column}: expected {expected}, got {actual}")]
    TypeMismatch {
        column: usize,
        expected: ColumnType,
        actual: &'static str,
    },

    /// Row index out of bounds on a read or write of a single row/cell
    #[error("Row index {0} out of range (count: {1})")]
    RowOutOfRange(usize, usize),

    /// Column index out of bounds on a read or write of a single column/cell
    #[error("Column index {0} out of range (count: {1})")]
    ColumnOutOfRange(usize, usize),

    /// Attempt to write through a view to data it does not own
    #[error("Read-only: {0}")]
    ReadOnly(String),

    /// JSON interchange error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error raised by a custom calculated column function, passed through as-is
    #[error(transparent)]
    Calculation(BoxError),
}

impl Error {
    /// Create a new configuration error with a message
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Returns the custom function error if this error came from one
    pub fn as_calculation(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Calculation(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<BoxError> for Error {
    fn from(err: BoxError) -> Self {
        // Errors from this crate bubbling back out of a custom function keep their identity.
        match err.downcast::<Error>() {
            Ok(inner) => *inner,
            Err(other) => Error::Calculation(other),
        }
    }
}
