//! Error types for qail-json.

use thiserror::Error;

/// Boxed error raised by a connection implementation.
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

/// The main error type for JSON adaptation and typecaster registration.
#[derive(Debug, Error)]
pub enum JsonError {
    /// No encode or decode function is available.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The server catalog has no row for the requested type.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serializing a value to JSON text failed.
    #[error("Encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// Parsing JSON text received from the server failed.
    #[error("Decode error: {0}")]
    Decode(#[source] serde_json::Error),

    /// A text-format array literal could not be parsed.
    #[error("Invalid array literal at position {position}: {message}")]
    ArrayLiteral { position: usize, message: String },

    /// A string literal contains a NUL byte, which PostgreSQL rejects.
    #[error("Value contains NULL byte (0x00) which is invalid in PostgreSQL")]
    NullByte,

    /// Error raised by the underlying connection, passed through as is.
    #[error(transparent)]
    Driver(DriverError),
}

impl JsonError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an array literal error at the given position.
    pub fn array_literal(position: usize, message: impl Into<String>) -> Self {
        Self::ArrayLiteral {
            position,
            message: message.into(),
        }
    }

    /// Wrap any connection error.
    pub fn driver(err: impl Into<DriverError>) -> Self {
        Self::Driver(err.into())
    }
}

impl From<sqlx::Error> for JsonError {
    fn from(err: sqlx::Error) -> Self {
        Self::Driver(Box::new(err))
    }
}

/// Result type alias for qail-json operations.
pub type JsonResult<T> = Result<T, JsonError>;
