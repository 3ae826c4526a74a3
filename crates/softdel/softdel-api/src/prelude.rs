//! Prelude exposes all the types for `softdel-api` crate.

pub use crate::error::{SessionError, SoftDelError, SoftDelResult};
pub use crate::key::{
    ConfigError, FULL_IDENTIFIER_LENGTH, GenerationError, KeyStrategy, MAX_COMPACT_LENGTH,
    MIN_COMPACT_LENGTH,
};
pub use crate::query::{
    Delete, ExecutionOptions, Filter, Join, Record, Select, Statement, resolve_column,
};
pub use crate::schema::{
    CascadeError, Catalog, ColumnDef, DataTypeKind, ForeignKeyDef, OnDelete, RelationDef,
    RelationKind, TableDef,
};
pub use crate::storage::{Storage, StorageError, WriteOp};
pub use crate::value::Value;
