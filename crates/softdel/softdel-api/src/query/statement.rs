use crate::query::Filter;

/// Per-call options attached to a statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Return soft-deleted rows too.
    pub include_deleted: bool,
}

/// An inner join of `table` on `left = right`.
///
/// Both column names should be qualified with their table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub table: &'static str,
    pub left: String,
    pub right: String,
}

/// A read statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    /// Table the rows are selected from.
    pub table: &'static str,
    pub joins: Vec<Join>,
    pub filter: Option<Filter>,
    pub options: ExecutionOptions,
}

impl Select {
    /// Selects every row of `table`.
    pub fn from(table: &'static str) -> Self {
        Self {
            table,
            joins: vec![],
            filter: None,
            options: ExecutionOptions::default(),
        }
    }

    /// Joins `table` on `left = right`.
    pub fn join(mut self, table: &'static str, left: &str, right: &str) -> Self {
        self.joins.push(Join {
            table,
            left: left.to_string(),
            right: right.to_string(),
        });
        self
    }

    /// Adds a condition, in AND with the existing ones.
    pub fn and_where(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    /// Opts this single call into seeing soft-deleted rows.
    pub fn include_deleted(mut self) -> Self {
        self.options.include_deleted = true;
        self
    }

    /// Returns every table referenced by the statement.
    pub fn tables(&self) -> Vec<&'static str> {
        std::iter::once(self.table)
            .chain(self.joins.iter().map(|join| join.table))
            .collect()
    }
}

/// A delete statement selecting its rows through a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delete {
    pub table: &'static str,
    pub filter: Option<Filter>,
    pub options: ExecutionOptions,
}

impl Delete {
    pub fn from(table: &'static str) -> Self {
        Self {
            table,
            filter: None,
            options: ExecutionOptions::default(),
        }
    }

    /// Adds a condition, in AND with the existing ones.
    pub fn and_where(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    /// Lets the statement reach soft-deleted rows too.
    pub fn include_deleted(mut self) -> Self {
        self.options.include_deleted = true;
        self
    }
}

/// A statement on its way to the persistence engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Select(Select),
    Delete(Delete),
}

impl Statement {
    /// Returns every table referenced by the statement.
    pub fn tables(&self) -> Vec<&'static str> {
        match self {
            Statement::Select(select) => select.tables(),
            Statement::Delete(delete) => vec![delete.table],
        }
    }

    pub fn options(&self) -> ExecutionOptions {
        match self {
            Statement::Select(select) => select.options,
            Statement::Delete(delete) => delete.options,
        }
    }

    pub fn filter(&self) -> Option<&Filter> {
        match self {
            Statement::Select(select) => select.filter.as_ref(),
            Statement::Delete(delete) => delete.filter.as_ref(),
        }
    }

    /// Adds a condition, in AND with the existing ones.
    pub fn and_where(self, filter: Filter) -> Self {
        match self {
            Statement::Select(select) => Statement::Select(select.and_where(filter)),
            Statement::Delete(delete) => Statement::Delete(delete.and_where(filter)),
        }
    }
}

impl From<Select> for Statement {
    fn from(select: Select) -> Self {
        Statement::Select(select)
    }
}

impl From<Delete> for Statement {
    fn from(delete: Delete) -> Self {
        Statement::Delete(delete)
    }
}
