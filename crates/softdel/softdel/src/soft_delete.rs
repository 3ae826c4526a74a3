//! This module contains the soft-delete components: the statement rewriter hiding deleted rows,
//! the cascade manager propagating deletions across relationships and the before-commit hook
//! turning deletes into deletion timestamp updates.

mod cascade;
mod hook;
mod rewriter;
mod settings;

pub use self::cascade::{CascadeManager, configure_cascade};
pub use self::hook::{SoftDeleteHook, TimestampColumns};
pub use self::rewriter::SoftDeleteFilter;
pub use self::settings::{IgnoredTableSettings, SoftDelete, SoftDeleteSettings};
