use thiserror::Error;

/// Errors raised by the time-series accessor itself.
///
/// Failures of the underlying table are never wrapped in here; they reach the
/// caller as the table's own error type.
#[derive(Debug, Error)]
pub enum SeriesError {
    /// The record handed to a write could not be viewed as a field mapping.
    #[error("cannot convert record into a field map: {0}")]
    Conversion(String),

    /// The configured timestamp field is missing or holds a non-timestamp value.
    #[error("field '{field}' must hold a timestamp, found {found}")]
    Type { field: String, found: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} field name must not be empty")]
    EmptyField(&'static str),

    #[error("field name '{0}' is reserved")]
    ReservedField(String),

    #[error("time field and id field are both '{0}'")]
    DuplicateField(String),

    #[error("bucket size must be a positive number of whole seconds, got {0}")]
    InvalidBucketSize(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("malformed config: {0}")]
    Json(String),
}

/// Errors reported by the in-memory reference table.
#[derive(Debug, Error, PartialEq)]
pub enum StorageError {
    #[error("no row matched in table '{0}'")]
    NotFound(String),

    #[error("table '{0}' does not exist")]
    TableMissing(String),

    #[error("table '{0}' already exists")]
    TableExists(String),

    #[error("row is missing primary key field '{0}'")]
    MissingKey(String),

    #[error("poisoned lock")]
    Poisoned,
}
