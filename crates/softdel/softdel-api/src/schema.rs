//! This module contains types describing tables, their columns and their relationships.

mod catalog;
mod column_def;
mod policy;
mod relation;
mod table_def;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::catalog::Catalog;
pub use self::column_def::{ColumnDef, DataTypeKind, ForeignKeyDef};
pub use self::policy::OnDelete;
pub use self::relation::{RelationDef, RelationKind};
pub use self::table_def::TableDef;

/// Errors raised while propagating a soft-delete across relationships.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum CascadeError {
    #[error(
        "Relation '{relation}' on table '{table}' combines soft-delete with a native delete-orphan cascade"
    )]
    InvalidConfiguration { table: String, relation: String },
    #[error("Cannot delete from '{table}': relation '{relation}' still has rows in '{blocking_table}'")]
    Protected {
        table: String,
        relation: String,
        blocking_table: String,
    },
    #[error("Relation '{relation}' on table '{table}' sets NULL on non-nullable column '{column}'")]
    SetNullOnRequiredColumn {
        table: String,
        relation: String,
        column: String,
    },
}
