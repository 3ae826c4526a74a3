use serde::{Deserialize, Serialize};

use crate::query::Record;
use crate::value::Value;

/// Statement filters.
///
/// The first value refers to the column name, and the second to the value to compare against.
/// A column name may be qualified with its table name (`posts.user_id`), which is
/// required to disambiguate columns when a statement joins several tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
    NotNull(String),
    IsNull(String),
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Creates an equality filter.
    pub fn eq(field: &str, value: Value) -> Self {
        Filter::Eq(field.to_string(), value)
    }

    /// Creates a not-equal filter.
    pub fn ne(field: &str, value: Value) -> Self {
        Filter::Ne(field.to_string(), value)
    }

    /// Creates an IN filter.
    pub fn in_list(field: &str, values: Vec<Value>) -> Self {
        Filter::In(field.to_string(), values)
    }

    /// Creates a NOT NULL filter.
    pub fn not_null(field: &str) -> Self {
        Filter::NotNull(field.to_string())
    }

    /// Creates an IS NULL filter.
    pub fn is_null(field: &str) -> Self {
        Filter::IsNull(field.to_string())
    }

    /// Chain two filters with AND.
    pub fn and(self, other: Filter) -> Self {
        Filter::And(Box::new(self), Box::new(other))
    }

    /// Chain two filters with OR.
    pub fn or(self, other: Filter) -> Self {
        Filter::Or(Box::new(self), Box::new(other))
    }

    /// Negate a filter with NOT.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// Returns whether `other` is one of the top-level conjuncts of this filter.
    pub fn has_conjunct(&self, other: &Filter) -> bool {
        match self {
            Filter::And(left, right) => left.has_conjunct(other) || right.has_conjunct(other),
            filter => filter == other,
        }
    }

    /// Checks if the given joined row matches the filter.
    ///
    /// Conditions on columns which are not part of the row never match.
    pub fn matches(&self, row: &[Record]) -> bool {
        match self {
            Filter::Eq(field, value) => resolve_column(row, field).is_some_and(|v| v == value),
            Filter::Ne(field, value) => resolve_column(row, field).is_some_and(|v| v != value),
            Filter::In(field, list) => {
                resolve_column(row, field).is_some_and(|v| list.iter().any(|item| item == v))
            }
            Filter::NotNull(field) => resolve_column(row, field).is_some_and(|v| !v.is_null()),
            Filter::IsNull(field) => resolve_column(row, field).is_some_and(Value::is_null),
            Filter::And(left, right) => left.matches(row) && right.matches(row),
            Filter::Or(left, right) => left.matches(row) || right.matches(row),
            Filter::Not(inner) => !inner.matches(row),
        }
    }
}

/// Resolves a possibly qualified column name against a joined row.
///
/// Unqualified names resolve to the first record holding the column.
pub fn resolve_column<'a>(row: &'a [Record], field: &str) -> Option<&'a Value> {
    match field.split_once('.') {
        Some((table, column)) => row
            .iter()
            .find(|record| record.table() == table)
            .and_then(|record| record.get(column)),
        None => row.iter().find_map(|record| record.get(field)),
    }
}
