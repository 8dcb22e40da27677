//! Error types for the position normalization system.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the position normalization system.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (bad mapping, unknown source, invalid settings).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A mapped source column is not present in the input.
    ///
    /// Fatal for the whole batch: the mapping and the file disagree.
    #[error(
        "Configuration error: missing column '{column}' for field '{field}'. \
         Available: {available:?}"
    )]
    MissingColumn {
        /// Canonical field whose mapping points at the column.
        field: String,
        /// Source column name the mapping expects.
        column: String,
        /// Column names actually present in the input.
        available: Vec<String>,
    },

    /// Data error (invalid or missing data).
    #[error("Data error: {0}")]
    Data(String),

    /// A normalized record cannot be keyed for persistence.
    #[error("Unresolved {dimension} for record '{key}'")]
    Unresolved {
        /// Dimension that could not be resolved (broker, account, ...).
        dimension: String,
        /// External trade id of the offending record.
        key: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

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

    /// Create a missing column error.
    pub fn missing_column(
        field: impl Into<String>,
        column: impl Into<String>,
        available: &[String],
    ) -> Self {
        Error::MissingColumn {
            field: field.into(),
            column: column.into(),
            available: available.to_vec(),
        }
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create an unresolved dimension error.
    pub fn unresolved(dimension: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Unresolved {
            dimension: dimension.into(),
            key: key.into(),
        }
    }

    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Error::Database(msg.into())
    }

    /// Whether this error is a load-time configuration problem.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_) | Error::MissingColumn { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_message() {
        let available = vec!["Client Code".to_string(), "Quantity".to_string()];
        let err = Error::missing_column("account_number", "Account", &available);

        let msg = err.to_string();
        assert!(msg.contains("'Account'"));
        assert!(msg.contains("account_number"));
        assert!(msg.contains("Client Code"));
        assert!(msg.contains("Quantity"));
        assert!(err.is_config());
    }

    #[test]
    fn test_data_error_is_not_config() {
        assert!(!Error::data("bad row").is_config());
        assert!(!Error::unresolved("account", "3").is_config());
    }
}
