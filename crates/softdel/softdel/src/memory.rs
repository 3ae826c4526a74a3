//! In-memory reference implementation of [`Storage`].

use std::collections::HashMap;

use softdel_api::prelude::{
    Catalog, Filter, Record, Select, SoftDelResult, Storage, StorageError, Value, WriteOp,
    resolve_column,
};

/// In-memory storage engine.
///
/// Tables hold their rows in insertion order. Writes are applied on a copy of the tables which
/// replaces the current ones only when every operation succeeded, so that a batch is atomic.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    catalog: Catalog,
    tables: HashMap<&'static str, Vec<Record>>,
    sequences: HashMap<&'static str, u64>,
}

impl MemoryStorage {
    /// Creates a storage knowing the tables of `catalog`, none of which is created yet.
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            tables: HashMap::new(),
            sequences: HashMap::new(),
        }
    }

    /// Creates a storage with every table of `catalog` created and empty.
    pub fn bootstrap(catalog: Catalog) -> Self {
        let tables = catalog
            .tables()
            .iter()
            .map(|table| (table.name, Vec::new()))
            .collect();

        Self {
            catalog,
            tables,
            sequences: HashMap::new(),
        }
    }

    /// Creates an empty table; the table must be known to the catalog.
    pub fn create_table(&mut self, name: &str) -> SoftDelResult<()> {
        let table = self.catalog.require(name)?;
        self.tables.entry(table.name).or_default();
        Ok(())
    }

    /// Returns the rows of `table`, soft-deleted ones included.
    pub fn rows(&self, table: &str) -> &[Record] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the row of `table` with the given primary key.
    pub fn row(&self, table: &str, primary_key: &Value) -> Option<&Record> {
        self.rows(table)
            .iter()
            .find(|record| record.primary_key() == Some(primary_key))
    }

    /// Inserts a single row.
    pub fn insert(&mut self, record: Record) -> SoftDelResult<()> {
        self.apply(&[WriteOp::Insert { record }])
    }

    fn table_rows(&self, table: &str) -> Result<&Vec<Record>, StorageError> {
        self.tables
            .get(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))
    }

    fn apply_op(
        tables: &mut HashMap<&'static str, Vec<Record>>,
        op: &WriteOp,
    ) -> SoftDelResult<()> {
        let table = op.table();
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;

        match op {
            WriteOp::Insert { record } => {
                if let Some(pk) = record.primary_key()
                    && rows.iter().any(|row| row.primary_key() == Some(pk))
                {
                    return Err(StorageError::PrimaryKeyConflict {
                        table: table.to_string(),
                        key: pk.to_string(),
                    }
                    .into());
                }
                rows.push(record.clone());
            }
            WriteOp::Update {
                primary_key,
                record,
            } => {
                let row = rows
                    .iter_mut()
                    .find(|row| row.primary_key() == Some(primary_key))
                    .ok_or_else(|| StorageError::RowNotFound {
                        table: table.to_string(),
                        key: primary_key.to_string(),
                    })?;
                *row = record.clone();
            }
            WriteOp::Delete { primary_key, .. } => {
                let before = rows.len();
                rows.retain(|row| row.primary_key() != Some(primary_key));
                if rows.len() == before {
                    return Err(StorageError::RowNotFound {
                        table: table.to_string(),
                        key: primary_key.to_string(),
                    }
                    .into());
                }
            }
            WriteOp::BulkUpdate { patch, filter, .. } => {
                for row in rows.iter_mut().filter(|row| row_matches(filter, row)) {
                    for (column, value) in patch {
                        row.set(column, value.clone())?;
                    }
                }
            }
            WriteOp::BulkDelete { filter, .. } => {
                rows.retain(|row| !row_matches(filter, row));
            }
        }

        Ok(())
    }
}

/// A missing filter matches every row.
fn row_matches(filter: &Option<Filter>, row: &Record) -> bool {
    filter
        .as_ref()
        .is_none_or(|filter| filter.matches(std::slice::from_ref(row)))
}

impl Storage for MemoryStorage {
    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn select(&self, select: &Select) -> SoftDelResult<Vec<Vec<Record>>> {
        let mut rows = self
            .table_rows(select.table)?
            .iter()
            .map(|record| vec![record.clone()])
            .collect::<Vec<_>>();

        // nested loop inner joins
        for join in &select.joins {
            let candidates = self.table_rows(join.table)?;
            let mut joined = Vec::with_capacity(rows.len());
            for row in rows {
                for candidate in candidates {
                    let mut combined = row.clone();
                    combined.push(candidate.clone());
                    let left = resolve_column(&combined, &join.left);
                    let right = resolve_column(&combined, &join.right);
                    if left.is_some_and(|value| !value.is_null()) && left == right {
                        joined.push(combined);
                    }
                }
            }
            rows = joined;
        }

        if let Some(filter) = &select.filter {
            rows.retain(|row| filter.matches(row));
        }
        tracing::trace!(table = select.table, rows = rows.len(), "executed select");

        Ok(rows)
    }

    fn exists(&self, table: &str, primary_key: &Value) -> SoftDelResult<bool> {
        Ok(self
            .table_rows(table)?
            .iter()
            .any(|row| row.primary_key() == Some(primary_key)))
    }

    fn next_sequence(&mut self, table: &str) -> SoftDelResult<u64> {
        let rows = self.table_rows(table)?;
        let table = self.catalog.require(table)?.name;
        let highest_key = rows
            .iter()
            .filter_map(|row| row.primary_key().and_then(Value::as_uint64))
            .max()
            .unwrap_or_default();

        let sequence = self.sequences.entry(table).or_default();
        *sequence = (*sequence).max(highest_key) + 1;
        Ok(*sequence)
    }

    fn apply(&mut self, ops: &[WriteOp]) -> SoftDelResult<()> {
        let mut staged = self.tables.clone();
        for op in ops {
            if let Err(err) = Self::apply_op(&mut staged, op) {
                tracing::debug!(error = %err, table = op.table(), "write failed; discarding batch");
                return Err(err);
            }
        }
        self.tables = staged;
        tracing::debug!(ops = ops.len(), "applied write batch");

        Ok(())
    }
}

#[cfg(test)]
mod test {

    use softdel_api::prelude::SoftDelError;

    use super::*;
    use crate::tests::{self, POSTS, USERS};

    fn user(id: u64, name: &str) -> Record {
        Record::new(&USERS, [("id", Value::from(id)), ("name", Value::from(name))])
            .expect("valid user")
    }

    #[test]
    fn test_should_not_create_tables_on_new() {
        let storage = MemoryStorage::new(tests::catalog());
        assert!(matches!(
            storage.exists("users", &Value::Uint64(1)),
            Err(SoftDelError::Storage(StorageError::TableNotFound(_)))
        ));
    }

    #[test]
    fn test_should_create_table() {
        let mut storage = MemoryStorage::new(tests::catalog());
        storage.create_table("users").expect("known table");
        assert!(!storage.exists("users", &Value::Uint64(1)).expect("created"));
        assert!(matches!(
            storage.create_table("unknown"),
            Err(SoftDelError::Storage(StorageError::TableNotFound(_)))
        ));
    }

    #[test]
    fn test_should_insert_and_select() {
        let mut storage = MemoryStorage::bootstrap(tests::catalog());
        storage.insert(user(1, "Alice")).expect("should insert");
        storage.insert(user(2, "Bob")).expect("should insert");

        let rows = storage
            .select(&Select::from("users").and_where(Filter::eq("name", "Bob".into())))
            .expect("should select");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0].get("id"), Some(&Value::Uint64(2)));
        assert!(storage.exists("users", &Value::Uint64(1)).expect("exists"));
    }

    #[test]
    fn test_should_reject_duplicated_primary_key() {
        let mut storage = MemoryStorage::bootstrap(tests::catalog());
        storage.insert(user(1, "Alice")).expect("should insert");
        assert!(matches!(
            storage.insert(user(1, "Bob")),
            Err(SoftDelError::Storage(StorageError::PrimaryKeyConflict { .. }))
        ));
    }

    #[test]
    fn test_should_join_tables() {
        let storage = tests::seeded_storage();
        let rows = storage
            .select(
                &Select::from("posts")
                    .join("users", "posts.user_id", "users.id")
                    .and_where(Filter::eq("users.name", "Alice".into())),
            )
            .expect("should select");

        let mut post_ids = rows
            .iter()
            .map(|row| row[0].get("id").cloned())
            .collect::<Vec<_>>();
        post_ids.sort();
        assert_eq!(
            post_ids,
            vec![Some(Value::Uint64(10)), Some(Value::Uint64(11))]
        );
        assert!(rows.iter().all(|row| row.len() == 2 && row[1].table() == "users"));
    }

    #[test]
    fn test_should_apply_batch_atomically() {
        let mut storage = tests::seeded_storage();
        let mut renamed = storage
            .row("users", &Value::Uint64(1))
            .cloned()
            .expect("seeded user");
        renamed.set("name", "Alicia".into()).expect("known column");

        let result = storage.apply(&[
            WriteOp::Update {
                primary_key: Value::Uint64(1),
                record: renamed,
            },
            WriteOp::Delete {
                table: "users",
                primary_key: Value::Uint64(99),
            },
        ]);
        assert!(matches!(
            result,
            Err(SoftDelError::Storage(StorageError::RowNotFound { .. }))
        ));
        assert_eq!(
            storage
                .row("users", &Value::Uint64(1))
                .and_then(|row| row.get("name")),
            Some(&Value::from("Alice"))
        );
    }

    #[test]
    fn test_should_bulk_update_and_delete() {
        let mut storage = tests::seeded_storage();
        storage
            .apply(&[
                WriteOp::BulkUpdate {
                    table: "comments",
                    patch: vec![("author_id", Value::Null)],
                    filter: Some(Filter::eq("author_id", Value::Uint64(1))),
                },
                WriteOp::BulkDelete {
                    table: "user_roles",
                    filter: Some(Filter::eq("user_id", Value::Uint64(1))),
                },
            ])
            .expect("should apply");

        assert!(
            storage
                .rows("comments")
                .iter()
                .all(|row| row.get("author_id") != Some(&Value::Uint64(1)))
        );
        assert_eq!(storage.rows("user_roles").len(), 1);
    }

    #[test]
    fn test_should_allocate_sequence_past_existing_keys() {
        let mut storage = tests::seeded_storage();
        assert_eq!(storage.next_sequence("users").expect("sequence"), 4);
        assert_eq!(storage.next_sequence("users").expect("sequence"), 5);
        assert_eq!(
            storage.next_sequence(POSTS.name).expect("sequence"),
            21,
            "posts go up to 20"
        );
    }
}
