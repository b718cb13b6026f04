//! Error types for the preparation pipeline and the warehouse loader.
//!
//! Every failure the library can surface is an [`EtlError`]. Column-level
//! failures carry the offending column name so callers can decide whether
//! to continue with the next entity or abort the run.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the ETL pipeline.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in the dataset")]
    ColumnNotFound(String),

    /// A cell could not be coerced to the requested type.
    #[error("Failed to convert column '{column}' to {target_type}: {reason}")]
    TypeConversionFailed {
        column: String,
        target_type: String,
        reason: String,
    },

    /// The column exists but its type does not support the operation.
    #[error("Column '{column}' has type {actual}, expected {expected}")]
    InvalidColumnType {
        column: String,
        expected: String,
        actual: String,
    },

    /// The operation is well-formed but would break a dataset invariant.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A source file could not be read or parsed.
    #[error("Failed to ingest {entity}: {reason}")]
    Ingestion { entity: String, reason: String },

    /// The warehouse load was rolled back.
    #[error("Warehouse load failed: {0}")]
    Load(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite error wrapper.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EtlError>,
    },
}

impl EtlError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EtlError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code, independent of the message text.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::TypeConversionFailed { .. } => "TYPE_CONVERSION_FAILED",
            Self::InvalidColumnType { .. } => "INVALID_COLUMN_TYPE",
            Self::InvalidOperation(_) => "INVALID_OPERATION",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Ingestion { .. } => "INGESTION_FAILED",
            Self::Load(_) => "LOAD_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// The column named by a column-level failure, looking through context.
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::ColumnNotFound(column) => Some(column),
            Self::TypeConversionFailed { column, .. } | Self::InvalidColumnType { column, .. } => {
                Some(column)
            }
            Self::WithContext { source, .. } => source.column(),
            _ => None,
        }
    }

    /// Check if this error is scoped to a single column operation.
    ///
    /// Column-scoped failures abort the current operation chain but leave
    /// the dataset untouched, so the caller may keep going with other work.
    pub fn is_column_scoped(&self) -> bool {
        self.column().is_some()
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for EtlError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("EtlError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for ETL operations.
pub type Result<T> = std::result::Result<T, EtlError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| EtlError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| EtlError::Sqlite(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            EtlError::ColumnNotFound("test".to_string()).error_code(),
            "COLUMN_NOT_FOUND"
        );
        assert_eq!(EtlError::Load("boom".to_string()).error_code(), "LOAD_FAILED");
    }

    #[test]
    fn test_column_lookup() {
        let error = EtlError::ColumnNotFound("Region".to_string());
        assert_eq!(error.column(), Some("Region"));
        assert!(error.is_column_scoped());

        let error = EtlError::Load("constraint".to_string());
        assert_eq!(error.column(), None);
        assert!(!error.is_column_scoped());
    }

    #[test]
    fn test_error_serialization() {
        let error = EtlError::ColumnNotFound("JoinDate".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("JoinDate"));
    }

    #[test]
    fn test_with_context() {
        let error = EtlError::ColumnNotFound("test".to_string()).with_context("While renaming");
        assert!(error.to_string().contains("While renaming"));
        assert_eq!(error.error_code(), "COLUMN_NOT_FOUND"); // Code of the wrapped error
        assert_eq!(error.column(), Some("test"));
    }
}
