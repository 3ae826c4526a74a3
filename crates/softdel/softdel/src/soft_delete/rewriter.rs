use std::sync::atomic::{AtomicBool, Ordering};

use softdel_api::prelude::{Catalog, Filter, Statement};

use crate::session::StatementInterceptor;

/// Hides soft-deleted rows from every statement going to the storage.
///
/// For each table referenced by a statement which carries the deletion column, a
/// `<table>.<column> IS NULL` condition is added in AND with the existing ones. Statements
/// executed with [`ExecutionOptions::include_deleted`](softdel_api::prelude::ExecutionOptions)
/// are left untouched, as is every statement while the filter is deactivated.
#[derive(Debug)]
pub struct SoftDeleteFilter {
    column: String,
    active: AtomicBool,
    ignored: Vec<(String, Option<String>)>,
}

impl SoftDeleteFilter {
    /// Creates an active filter on the given deletion column.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            active: AtomicBool::new(true),
            ignored: Vec::new(),
        }
    }

    /// Excludes a table from filtering.
    ///
    /// Both the name and the schema must match the table for it to be excluded.
    pub fn ignore_table(mut self, name: impl Into<String>, schema: Option<&str>) -> Self {
        self.ignored
            .push((name.into(), schema.map(str::to_string)));
        self
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn activate(&self) {
        self.active.store(true, Ordering::Release);
        tracing::debug!(column = %self.column, "soft-delete filter activated");
    }

    /// Lets every statement see soft-deleted rows, until [`SoftDeleteFilter::activate`] is called.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
        tracing::debug!(column = %self.column, "soft-delete filter deactivated");
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Adds the deletion condition of every filtered table referenced by `statement`.
    pub fn rewrite(&self, catalog: &Catalog, statement: Statement) -> Statement {
        if !self.is_active() || statement.options().include_deleted {
            return statement;
        }

        let mut statement = statement;
        for table in statement.tables() {
            let Some(def) = catalog.table(table) else {
                continue;
            };
            if !def.has_column(&self.column) || self.is_ignored(def.name, def.schema) {
                continue;
            }

            let condition = Filter::is_null(&format!("{}.{}", def.name, self.column));
            let present = statement
                .filter()
                .is_some_and(|filter| filter.has_conjunct(&condition));
            if !present {
                tracing::trace!(table, "filtering soft-deleted rows");
                statement = statement.and_where(condition);
            }
        }

        statement
    }

    fn is_ignored(&self, name: &str, schema: Option<&str>) -> bool {
        self.ignored
            .iter()
            .any(|(ignored, ignored_schema)| ignored == name && ignored_schema.as_deref() == schema)
    }
}

impl StatementInterceptor for SoftDeleteFilter {
    fn intercept(&self, catalog: &Catalog, statement: Statement) -> Statement {
        self.rewrite(catalog, statement)
    }
}
