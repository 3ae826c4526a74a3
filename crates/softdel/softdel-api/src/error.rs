use serde::{Deserialize, Serialize};
use thiserror::Error;

/// softdel Error type
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum SoftDelError {
    #[error("Cascade error: {0}")]
    Cascade(#[from] crate::schema::CascadeError),
    #[error("Configuration error: {0}")]
    Config(#[from] crate::key::ConfigError),
    #[error("Key generation error: {0}")]
    Generation(#[from] crate::key::GenerationError),
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// softdel Result type
pub type SoftDelResult<T> = Result<T, SoftDelError>;

/// Errors raised by the unit of work.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum SessionError {
    #[error("Entity {0} is not loaded in the session")]
    EntityNotLoaded(String),
    #[error("Relation '{relation}' cannot be used this way on table '{table}'")]
    InvalidRelation { table: String, relation: String },
    #[error("A lock was poisoned by a panicking thread")]
    LockPoisoned,
    #[error("Entity in table '{0}' has no primary key")]
    MissingPrimaryKey(String),
    #[error("Unknown relation '{relation}' on table '{table}'")]
    UnknownRelation { table: String, relation: String },
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::key::{ConfigError, GenerationError};
    use crate::schema::CascadeError;
    use crate::storage::StorageError;

    #[test]
    fn test_should_display_generation_error() {
        let error = SoftDelError::Generation(GenerationError::Exhausted {
            table: "users".to_string(),
            attempts: 3,
        });
        assert_eq!(
            error.to_string(),
            "Key generation error: Could not generate a unique key for table 'users' after 3 attempts"
        );
    }

    #[test]
    fn test_should_display_cascade_error() {
        let error = SoftDelError::Cascade(CascadeError::Protected {
            table: "users".to_string(),
            relation: "invoices".to_string(),
            blocking_table: "invoices".to_string(),
        });
        assert_eq!(
            error.to_string(),
            "Cascade error: Cannot delete from 'users': relation 'invoices' still has rows in 'invoices'"
        );
    }

    #[test]
    fn test_should_display_config_error() {
        let error = SoftDelError::Config(ConfigError::CompactLengthOutOfRange(4));
        assert_eq!(
            error.to_string(),
            "Configuration error: Compact identifier length must be between 8 and 32, got 4"
        );
    }

    #[test]
    fn test_should_display_storage_error() {
        let error = SoftDelError::Storage(StorageError::TableNotFound("users".to_string()));
        assert_eq!(error.to_string(), "Storage error: Table not found: users");
    }

    #[test]
    fn test_should_display_session_error() {
        let error = SoftDelError::Session(SessionError::LockPoisoned);
        assert_eq!(
            error.to_string(),
            "Session error: A lock was poisoned by a panicking thread"
        );
    }

    #[test]
    fn test_should_convert_from_storage_error() {
        let error: SoftDelError = StorageError::TableNotFound("t".to_string()).into();
        assert!(matches!(
            error,
            SoftDelError::Storage(StorageError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_should_convert_from_generation_error() {
        let error: SoftDelError = GenerationError::ClockRegression { last: 10, now: 5 }.into();
        assert!(matches!(error, SoftDelError::Generation(_)));
    }
}
