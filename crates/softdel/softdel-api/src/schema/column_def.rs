use serde::{Deserialize, Serialize};

/// An enumeration of all supported column data type kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataTypeKind {
    Boolean,
    Int64,
    /// Unbounded text.
    Text,
    Timestamp,
    Uint64,
    /// Text with a maximum length in characters.
    Varchar(u16),
}

impl DataTypeKind {
    /// Returns whether the column stores integers.
    pub fn is_integer(&self) -> bool {
        matches!(self, DataTypeKind::Int64 | DataTypeKind::Uint64)
    }

    /// Returns whether the column can store a text of `len` characters.
    pub fn fits_text(&self, len: usize) -> bool {
        match self {
            DataTypeKind::Text => true,
            DataTypeKind::Varchar(max) => len <= *max as usize,
            _ => false,
        }
    }
}

/// Defines a column in a database table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    /// The name of the column.
    pub name: &'static str,
    /// The data type of the column.
    pub data_type: DataTypeKind,
    /// Indicates if this column can contain NULL values.
    pub nullable: bool,
    /// Indicates if this column is the primary key.
    pub primary_key: bool,
    /// Foreign key definition, if any.
    pub foreign_key: Option<ForeignKeyDef>,
}

impl ColumnDef {
    /// Creates a non-nullable plain column.
    pub const fn new(name: &'static str, data_type: DataTypeKind) -> Self {
        Self {
            name,
            data_type,
            nullable: false,
            primary_key: false,
            foreign_key: None,
        }
    }

    /// Marks the column as the primary key.
    pub const fn primary_key(self) -> Self {
        Self {
            primary_key: true,
            ..self
        }
    }

    /// Marks the column as nullable.
    pub const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    /// Makes the column a foreign key to `foreign_table.foreign_column`.
    pub const fn references(
        self,
        foreign_table: &'static str,
        foreign_column: &'static str,
    ) -> Self {
        Self {
            foreign_key: Some(ForeignKeyDef {
                local_column: self.name,
                foreign_table,
                foreign_column,
            }),
            ..self
        }
    }
}

/// Defines a foreign key relationship for a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForeignKeyDef {
    /// Name of the local column that holds the foreign key (es: "user_id")
    pub local_column: &'static str,
    /// Name of the foreign table (e.g., "users")
    pub foreign_table: &'static str,
    /// Name of the foreign column that the FK points to (e.g., "id")
    pub foreign_column: &'static str,
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_should_create_column_def() {
        let column = ColumnDef::new("id", DataTypeKind::Uint64).primary_key();

        assert_eq!(column.name, "id");
        assert_eq!(column.data_type, DataTypeKind::Uint64);
        assert!(!column.nullable);
        assert!(column.primary_key);
        assert!(column.foreign_key.is_none());
    }

    #[test]
    fn test_should_create_column_def_with_foreign_key() {
        let column = ColumnDef::new("user_id", DataTypeKind::Uint64)
            .nullable()
            .references("users", "id");

        assert!(column.nullable);
        let fk = column.foreign_key.expect("should have foreign key");
        assert_eq!(fk.local_column, "user_id");
        assert_eq!(fk.foreign_table, "users");
        assert_eq!(fk.foreign_column, "id");
    }

    #[test]
    fn test_should_tell_integer_kinds() {
        assert!(DataTypeKind::Uint64.is_integer());
        assert!(DataTypeKind::Int64.is_integer());
        assert!(!DataTypeKind::Text.is_integer());
        assert!(!DataTypeKind::Varchar(36).is_integer());
    }

    #[test]
    fn test_should_tell_whether_text_fits() {
        assert!(DataTypeKind::Text.fits_text(4096));
        assert!(DataTypeKind::Varchar(36).fits_text(36));
        assert!(!DataTypeKind::Varchar(16).fits_text(36));
        assert!(!DataTypeKind::Uint64.fits_text(1));
    }
}
