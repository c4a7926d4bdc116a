//! # ORM Error Handling
//!
//! Typed errors for every fallible mapper, builder and migration
//! operation. Backend failures keep the engine's message attached and
//! are never swallowed; schema mismatches are loud rather than lossy.

use thiserror::Error;

/// Result type alias for ORM operations
pub type Result<T> = std::result::Result<T, OrmError>;

/// Error types for database access, row mapping and migrations
#[derive(Error, Debug)]
pub enum OrmError {
    /// The database file could not be opened
    #[error("Failed to open database '{path}': {message}")]
    OpenFailed {
        /// The path we tried to open
        path: String,
        /// The backend's message
        message: String,
    },

    /// The backend rejected a statement
    #[error("Query failed: {message}")]
    Query {
        /// The backend's message
        message: String,
    },

    /// Invalid input to a builder or repository operation
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong
        message: String,
    },

    /// Result columns do not correspond 1:1 with the record's fields
    #[error("Column mismatch for {table}: {detail}")]
    ColumnMismatch {
        /// The record type's table name
        table: String,
        /// Which side diverged and how
        detail: String,
    },

    /// A null database value was mapped into a non-optional field
    #[error("Null value in column '{column}' for a non-optional field")]
    NullValueForNonOptional {
        /// The offending column
        column: String,
    },

    /// A stored ordinal has no matching enum variant
    #[error("Invalid ordinal {value} in column '{column}'")]
    InvalidEnumOrdinal {
        /// The offending column
        column: String,
        /// The stored ordinal
        value: i64,
    },

    /// A database value has the wrong type for the target field
    #[error("Type mismatch in column '{column}': expected {expected}")]
    TypeMismatch {
        /// The offending column
        column: String,
        /// What the field required
        expected: &'static str,
    },

    /// Rollback target is not in the migration set
    #[error("Migration version {version} not found")]
    MigrationNotFound {
        /// The requested version
        version: i64,
    },

    /// Rollback target has not been applied
    #[error("Migration version {version} has not been applied")]
    MigrationNotApplied {
        /// The requested version
        version: i64,
    },

    /// Two migrations share one version
    #[error("Duplicate migration version {version}")]
    DuplicateMigrationVersion {
        /// The conflicting version
        version: i64,
    },

    /// The pool had no free connection within the acquire timeout
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Filesystem error during migration discovery
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for OrmError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::PoolExhausted,
            other => Self::Query {
                message: other.to_string(),
            },
        }
    }
}

impl OrmError {
    /// Convenience constructor for invalid-argument failures
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_mismatch_display() {
        let err = OrmError::ColumnMismatch {
            table: "User".to_string(),
            detail: "no column for field 'age'".to_string(),
        };
        assert!(err.to_string().contains("User"));
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn test_pool_timeout_classified() {
        let err: OrmError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, OrmError::PoolExhausted));
    }

    #[test]
    fn test_null_error_names_column() {
        let err = OrmError::NullValueForNonOptional {
            column: "email".to_string(),
        };
        assert!(err.to_string().contains("email"));
    }
}
