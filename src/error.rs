// ⚠️ Error Taxonomy - typed, recoverable, surfaced to the caller
// Engine errors (loading + computing) and store errors (ranking list mutations)

use crate::schema::ValidationErrors;
use chrono::NaiveDate;
use thiserror::Error;

/// Result type for engine operations (loading, joining, averaging)
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Result type for ranked record store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ============================================================================
// ENGINE ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum EngineError {
    /// Underlying CSV reader/writer failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required header is not present in a source table
    #[error("{table} table is missing required column '{column}'")]
    MissingColumn { table: &'static str, column: String },

    /// A cell could not be interpreted
    #[error("{table} table, line {line}, column '{column}': {message}")]
    Parse {
        table: &'static str,
        line: u64,
        column: String,
        message: String,
    },

    /// Tenure starts after it ends (user-correctable input problem)
    #[error("tenure of '{entity}' on line {line} starts {start} after it ends {end}")]
    DateOrder {
        line: u64,
        entity: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    /// Inconsistent alias table (e.g. a cycle)
    #[error("Normalizer error: {0}")]
    Normalizer(String),
}

// ============================================================================
// STORE ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum StoreError {
    /// Malformed or incomplete submission, nothing was written
    #[error("Invalid record: {0}")]
    Validation(ValidationErrors),

    /// A record with the same (name, derived growth) already exists
    #[error("'{name}' with growth {growth} is already in the rankings")]
    Duplicate { name: String, growth: f64 },

    #[error("'{name}' not found in the rankings")]
    NotFound { name: String },

    /// More than one record shares the name; caller must resupply a growth value
    #[error("'{name}' matches {} records (growth values: {candidates:?}); specify which one", candidates.len())]
    Ambiguous { name: String, candidates: Vec<f64> },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The durable blob could not be interpreted as a ranking list
    #[error("Malformed rankings data: {0}")]
    Format(String),
}

impl StoreError {
    /// True for errors the caller can fix by changing its input
    pub fn is_user_error(&self) -> bool {
        !matches!(self, StoreError::Storage(_) | StoreError::Format(_))
    }
}

// ============================================================================
// STORAGE ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Keys are flat logical names; path traversal is refused
    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_message_lists_candidates() {
        let err = StoreError::Ambiguous {
            name: "Smith".to_string(),
            candidates: vec![0.1, 0.25],
        };

        let message = err.to_string();
        assert!(message.contains("matches 2 records"));
        assert!(message.contains("0.25"));
        assert!(err.is_user_error());
    }

    #[test]
    fn test_storage_errors_are_not_user_errors() {
        let err = StoreError::from(StorageError::InvalidKey("../etc".to_string()));
        assert!(!err.is_user_error());
    }
}
