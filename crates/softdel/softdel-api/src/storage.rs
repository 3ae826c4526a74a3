//! The seam between the core and the persistence engine it sits on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SoftDelResult;
use crate::query::{Filter, Record, Select};
use crate::schema::Catalog;
use crate::value::Value;

/// Storage related errors
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum StorageError {
    #[error("Primary key conflict on table '{table}': {key}")]
    PrimaryKeyConflict { table: String, key: String },
    #[error("Row {key} not found in table '{table}'")]
    RowNotFound { table: String, key: String },
    #[error("Table not found: {0}")]
    TableNotFound(String),
    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// A write sent to the persistence engine on commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Insert {
        record: Record,
    },
    /// Replaces the row identified by `primary_key` with `record`.
    Update {
        primary_key: Value,
        record: Record,
    },
    Delete {
        table: &'static str,
        primary_key: Value,
    },
    BulkUpdate {
        table: &'static str,
        patch: Vec<(&'static str, Value)>,
        filter: Option<Filter>,
    },
    BulkDelete {
        table: &'static str,
        filter: Option<Filter>,
    },
}

impl WriteOp {
    /// Name of the table the operation writes to.
    pub fn table(&self) -> &'static str {
        match self {
            WriteOp::Insert { record } | WriteOp::Update { record, .. } => record.table(),
            WriteOp::Delete { table, .. }
            | WriteOp::BulkUpdate { table, .. }
            | WriteOp::BulkDelete { table, .. } => table,
        }
    }
}

/// Operations the core consumes from the persistence engine.
pub trait Storage {
    /// Relationship and column metadata of the known tables.
    fn catalog(&self) -> &Catalog;

    /// Executes a select, returning one joined row per match.
    ///
    /// The statement is executed as is: any rewriting happened before.
    fn select(&self, select: &Select) -> SoftDelResult<Vec<Vec<Record>>>;

    /// Returns whether a row with the given primary key exists, soft-deleted or not.
    fn exists(&self, table: &str, primary_key: &Value) -> SoftDelResult<bool>;

    /// Allocates the next native auto-increment value of `table`.
    fn next_sequence(&mut self, table: &str) -> SoftDelResult<u64>;

    /// Applies all the operations atomically: either every operation is applied, or none.
    fn apply(&mut self, ops: &[WriteOp]) -> SoftDelResult<()>;
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::schema::{ColumnDef, DataTypeKind, TableDef};

    const COLUMNS: &[ColumnDef] = &[ColumnDef::new("id", DataTypeKind::Uint64).primary_key()];
    const USERS: TableDef = TableDef::new("users", COLUMNS);

    #[test]
    fn test_should_tell_op_table() {
        let insert = WriteOp::Insert {
            record: Record::empty(&USERS),
        };
        assert_eq!(insert.table(), "users");

        let bulk = WriteOp::BulkDelete {
            table: "user_roles",
            filter: None,
        };
        assert_eq!(bulk.table(), "user_roles");
    }

    #[test]
    fn test_should_display_storage_error() {
        let error = StorageError::UnknownColumn {
            table: "users".to_string(),
            column: "email".to_string(),
        };
        assert_eq!(error.to_string(), "Unknown column 'email' in table 'users'");
    }
}
