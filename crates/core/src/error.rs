//! Error types for the volatility dashboard pipeline.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error (malformed input or misaligned columns).
    #[error("Data error: {0}")]
    Data(String),

    /// The input table has no rows.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// A referenced column does not exist in the table.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Numeric failure inside a labeling model.
    #[error("Model error: {0}")]
    Model(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create an empty input error.
    pub fn empty_input(msg: impl Into<String>) -> Self {
        Error::EmptyInput(msg.into())
    }

    /// Create a missing column error.
    pub fn missing_column(name: impl Into<String>) -> Self {
        Error::MissingColumn(name.into())
    }

    /// Create a model error.
    pub fn model(msg: impl Into<String>) -> Self {
        Error::Model(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::missing_column("vol_20").to_string(),
            "Missing column: vol_20"
        );
        assert_eq!(
            Error::empty_input("no rows").to_string(),
            "Empty input: no rows"
        );
    }
}
