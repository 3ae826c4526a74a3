use crate::schema::{ColumnDef, TableDef};
use crate::storage::StorageError;
use crate::value::Value;

/// A row of a table, holding a value for each of its columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    table: &'static str,
    values: Vec<(ColumnDef, Value)>,
}

impl Record {
    /// Builds a record for `table` with every column set to [`Value::Null`].
    pub fn empty(table: &'static TableDef) -> Self {
        Self {
            table: table.name,
            values: table
                .columns
                .iter()
                .map(|col| (*col, Value::Null))
                .collect(),
        }
    }

    /// Builds a record for `table` from `(column, value)` pairs.
    ///
    /// Columns not listed are set to [`Value::Null`].
    pub fn new<'a, I>(table: &'static TableDef, values: I) -> Result<Self, StorageError>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut record = Self::empty(table);
        for (column, value) in values {
            record.set(column, value)?;
        }

        Ok(record)
    }

    /// Name of the table the record belongs to.
    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(col, _)| col.name == column)
            .map(|(_, value)| value)
    }

    /// Sets the value of `column`.
    pub fn set(&mut self, column: &str, value: Value) -> Result<(), StorageError> {
        let slot = self
            .values
            .iter_mut()
            .find(|(col, _)| col.name == column)
            .ok_or_else(|| StorageError::UnknownColumn {
                table: self.table.to_string(),
                column: column.to_string(),
            })?;
        slot.1 = value;
        Ok(())
    }

    /// Returns the primary key value, unless it is not set yet.
    pub fn primary_key(&self) -> Option<&Value> {
        self.values
            .iter()
            .find(|(col, _)| col.primary_key)
            .map(|(_, value)| value)
            .filter(|value| !value.is_null())
    }

    pub fn values(&self) -> &[(ColumnDef, Value)] {
        &self.values
    }

    /// Returns the name of the columns whose value differs from `other`.
    pub fn changed_columns(&self, other: &Record) -> Vec<&'static str> {
        self.values
            .iter()
            .filter(|(col, value)| other.get(col.name) != Some(value))
            .map(|(col, _)| col.name)
            .collect()
    }
}
