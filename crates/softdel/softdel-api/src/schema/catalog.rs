use super::TableDef;
use crate::storage::StorageError;

/// The set of tables known to the persistence engine.
///
/// It is the relationship metadata introspection point: given a table name, it returns
/// its columns and relationships.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    tables: Vec<&'static TableDef>,
}

impl Catalog {
    pub fn new(tables: Vec<&'static TableDef>) -> Self {
        Self { tables }
    }

    /// Returns the table with the given name.
    pub fn table(&self, name: &str) -> Option<&'static TableDef> {
        self.tables.iter().copied().find(|table| table.name == name)
    }

    /// Returns the table with the given name or a [`StorageError::TableNotFound`].
    pub fn require(&self, name: &str) -> Result<&'static TableDef, StorageError> {
        self.table(name)
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }

    pub fn tables(&self) -> &[&'static TableDef] {
        &self.tables
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::schema::{ColumnDef, DataTypeKind};

    const USER_COLUMNS: &[ColumnDef] = &[ColumnDef::new("id", DataTypeKind::Uint64).primary_key()];

    const USERS: TableDef = TableDef::new("users", USER_COLUMNS);

    #[test]
    fn test_should_lookup_table() {
        let catalog = Catalog::new(vec![&USERS]);
        assert_eq!(catalog.table("users").map(|t| t.name), Some("users"));
        assert!(catalog.table("posts").is_none());
        assert_eq!(catalog.tables().len(), 1);
    }

    #[test]
    fn test_should_fail_requiring_unknown_table() {
        let catalog = Catalog::new(vec![&USERS]);
        assert!(matches!(
            catalog.require("posts"),
            Err(StorageError::TableNotFound(name)) if name == "posts"
        ));
    }
}
