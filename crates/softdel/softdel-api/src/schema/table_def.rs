use super::{ColumnDef, RelationDef};
use crate::key::KeyStrategy;

/// Static definition of a table: its columns, relationships and key strategy override.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableDef {
    /// Name of the table.
    pub name: &'static str,
    /// Schema (namespace) the table lives in, if any.
    pub schema: Option<&'static str>,
    pub columns: &'static [ColumnDef],
    pub relations: &'static [RelationDef],
    /// Key strategy overriding the process-wide one, if any.
    pub key_strategy: Option<KeyStrategy>,
}

impl TableDef {
    pub const fn new(name: &'static str, columns: &'static [ColumnDef]) -> Self {
        Self {
            name,
            schema: None,
            columns,
            relations: &[],
            key_strategy: None,
        }
    }

    pub const fn in_schema(self, schema: &'static str) -> Self {
        Self {
            schema: Some(schema),
            ..self
        }
    }

    pub const fn with_relations(self, relations: &'static [RelationDef]) -> Self {
        Self { relations, ..self }
    }

    pub const fn with_key_strategy(self, strategy: KeyStrategy) -> Self {
        Self {
            key_strategy: Some(strategy),
            ..self
        }
    }

    /// Returns the primary key column, if the table has one.
    pub fn primary_key(&self) -> Option<&'static ColumnDef> {
        self.columns.iter().find(|col| col.primary_key)
    }

    /// Returns the column with the given name.
    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Returns the relationship with the given name.
    pub fn relation(&self, name: &str) -> Option<&'static RelationDef> {
        self.relations.iter().find(|rel| rel.name == name)
    }
}
