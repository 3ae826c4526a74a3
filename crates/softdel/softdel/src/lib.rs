#![crate_name = "softdel"]
#![crate_type = "lib"]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # softdel
//!
//! Soft-delete, cascading lifecycle propagation and collision-safe primary key generation
//! on top of a relational persistence engine.
//!
//! The engine is reached through the [`Storage`](softdel_api::prelude::Storage) trait; units of
//! work are driven by a [`Session`](crate::prelude::Session), which runs the statement
//! interceptors on every read and the flush hooks before every commit.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use softdel::prelude::*;
//!
//! const USER_COLUMNS: &[ColumnDef] = &[
//!     ColumnDef::new("id", DataTypeKind::Uint64).primary_key(),
//!     ColumnDef::new("deleted_at", DataTypeKind::Timestamp).nullable(),
//! ];
//! const USERS: TableDef = TableDef::new("users", USER_COLUMNS);
//!
//! let keys = Arc::new(KeyStrategyRegistry::default());
//! let soft_delete = SoftDelete::from_settings(
//!     &SoftDeleteSettings::default(),
//!     keys,
//!     Arc::new(SystemClock),
//! );
//!
//! let mut storage = MemoryStorage::bootstrap(Catalog::new(vec![&USERS]));
//! let mut session = Session::new(&mut storage);
//! soft_delete.attach(&mut session)?;
//! # Ok::<(), SoftDelError>(())
//! ```
//!
//! ## Components
//!
//! - [`DistributedIdGenerator`](crate::prelude::DistributedIdGenerator): time-ordered 64-bit identifiers.
//! - [`KeyStrategyRegistry`](crate::prelude::KeyStrategyRegistry): the active key strategy and its parameters.
//! - [`generate_with_retry`](crate::prelude::generate_with_retry): existence check and bounded retry on collision.
//! - [`SoftDeleteFilter`](crate::prelude::SoftDeleteFilter): hides soft-deleted rows from reads.
//! - [`SoftDeleteHook`](crate::prelude::SoftDeleteHook): turns deletes into timestamp updates.
//! - [`CascadeManager`](crate::prelude::CascadeManager): applies the on-delete policy of each relationship.
//! - [`MemoryStorage`](crate::prelude::MemoryStorage): in-memory reference storage.

pub mod clock;
pub mod keys;
pub mod memory;
pub mod prelude;
pub mod session;
pub mod soft_delete;
