//! This module contains the statements sent to the persistence engine and the rows it returns.

mod filter;
mod record;
mod statement;

pub use self::filter::{Filter, resolve_column};
pub use self::record::Record;
pub use self::statement::{Delete, ExecutionOptions, Join, Select, Statement};
