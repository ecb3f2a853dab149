use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Errors from the store and the services built on it
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field_errors: HashMap<String, String>,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Stored data breaks a structural invariant, e.g. a cycle in reporting lines
    #[error("Data integrity error: {0}")]
    Integrity(String),

    #[error("Operation exceeded its deadline of {0:?}")]
    Timeout(Duration),

    #[error("Serialization failure: {0}")]
    SerializationFailure(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl DatabaseError {
    pub fn validation(message: impl Into<String>) -> Self {
        DatabaseError::Validation {
            message: message.into(),
            field_errors: HashMap::new(),
        }
    }

    pub fn field(field: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        let mut field_errors = HashMap::new();
        field_errors.insert(field.into(), error.clone());
        DatabaseError::Validation {
            message: error,
            field_errors,
        }
    }

    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound(format!("{} {} not found", entity, id))
    }

    /// Whether the caller may simply try again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DatabaseError::SerializationFailure(_) | DatabaseError::Timeout(_) | DatabaseError::Transaction(_)
        )
    }
}

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const QUERY_CANCELED: &str = "57014";

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return DatabaseError::NotFound("Record not found".to_string());
        }

        let Some(db_err) = err.as_database_error() else {
            return DatabaseError::Transaction(err.to_string());
        };

        let constraint = db_err.constraint().unwrap_or("unknown constraint").to_string();
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                DatabaseError::Conflict(format!("duplicate value violates {}", constraint))
            }
            Some(FOREIGN_KEY_VIOLATION) => {
                DatabaseError::Conflict(format!("reference violates {}", constraint))
            }
            Some(CHECK_VIOLATION) => DatabaseError::Validation {
                message: format!("value violates {}", constraint),
                field_errors: HashMap::new(),
            },
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                DatabaseError::SerializationFailure(db_err.message().to_string())
            }
            Some(QUERY_CANCELED) => DatabaseError::Transaction(format!("statement canceled: {}", db_err.message())),
            _ => DatabaseError::Transaction(db_err.message().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: DatabaseError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }

    #[test]
    fn pool_errors_are_retryable_transaction_errors() {
        let err: DatabaseError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DatabaseError::Transaction(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn field_error_carries_field_name() {
        match DatabaseError::field("score", "score must be between 1 and 3") {
            DatabaseError::Validation { field_errors, .. } => {
                assert_eq!(field_errors.get("score").map(String::as_str), Some("score must be between 1 and 3"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
