//! Error types for the migration engine and query builder
//!
//! Every fallible operation returns [`OrmResult`]. The nested error enums keep
//! the failure class visible to callers: a [`SecurityError`] means a query was
//! rejected before any SQL existed, a [`MigrationError`] means the enclosing
//! transaction was already rolled back.

use thiserror::Error;

/// Result type alias for engine operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum OrmError {
    /// An identifier or operator failed validation; no SQL was produced
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// Caller supplied an unusable value (negative limit, empty INSERT, ...)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrmError {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        OrmError::InvalidInput(message.into())
    }

    /// Whether this error came from identifier or operator validation
    pub fn is_security(&self) -> bool {
        matches!(self, OrmError::Security(_))
    }
}

/// Identifier validation failures raised while rendering a query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    #[error("invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier {
        identifier: String,
        reason: &'static str,
    },

    #[error("table '{0}' is not in the allowed table list")]
    TableNotAllowed(String),

    #[error("column '{0}' is not in the allowed column list")]
    ColumnNotAllowed(String),

    #[error("operator '{0}' is not supported")]
    OperatorNotAllowed(String),
}

impl SecurityError {
    pub(crate) fn invalid(identifier: &str, reason: &'static str) -> Self {
        SecurityError::InvalidIdentifier {
            identifier: identifier.to_string(),
            reason,
        }
    }
}

/// Migration failures. Raised only after the enclosing transaction has been
/// rolled back.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration {version} depends on {dependency}, which is not applied")]
    UnmetDependency { version: String, dependency: String },

    #[error("migration {0} is not applied")]
    NotApplied(String),

    #[error("migration {0} appears more than once in the descriptor list")]
    DuplicateVersion(String),

    #[error("migration {version} failed: {source}")]
    Execution {
        version: String,
        #[source]
        source: sqlx::Error,
    },

    /// Reading or creating the tracking table failed
    #[error("migration tracking table {table} is unusable: {source}")]
    Tracking {
        table: String,
        #[source]
        source: sqlx::Error,
    },
}

impl MigrationError {
    /// Version the failure is attributed to; `None` for tracking table failures
    pub fn version(&self) -> Option<&str> {
        match self {
            MigrationError::UnmetDependency { version, .. }
            | MigrationError::Execution { version, .. }
            | MigrationError::NotApplied(version)
            | MigrationError::DuplicateVersion(version) => Some(version),
            MigrationError::Tracking { .. } => None,
        }
    }
}

/// A foreign key reference that points at a missing parent row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyViolation {
    pub table: String,
    pub rowid: Option<i64>,
    pub parent: String,
    pub constraint_index: i64,
}

/// Schema introspection failures, naming the missing or violated element
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("missing tables: {}", .0.join(", "))]
    MissingTables(Vec<String>),

    #[error("table {table} is missing columns: {}", .columns.join(", "))]
    MissingColumns { table: String, columns: Vec<String> },

    #[error("table {table} is missing indexes: {}", .indexes.join(", "))]
    MissingIndexes { table: String, indexes: Vec<String> },

    #[error("{} foreign key violation(s)", .0.len())]
    ConstraintViolations(Vec<ForeignKeyViolation>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_error_display_names_identifier() {
        let err = OrmError::from(SecurityError::TableNotAllowed("secrets".to_string()));
        assert!(err.is_security());
        assert_eq!(
            err.to_string(),
            "table 'secrets' is not in the allowed table list"
        );
    }

    #[test]
    fn test_migration_error_carries_version() {
        let err = MigrationError::UnmetDependency {
            version: "002".to_string(),
            dependency: "001".to_string(),
        };
        assert_eq!(err.version(), Some("002"));
        assert!(err.to_string().contains("depends on 001"));
    }

    #[test]
    fn test_schema_error_lists_missing_columns() {
        let err = SchemaError::MissingColumns {
            table: "users".to_string(),
            columns: vec!["email".to_string(), "name".to_string()],
        };
        assert_eq!(err.to_string(), "table users is missing columns: email, name");
    }
}
