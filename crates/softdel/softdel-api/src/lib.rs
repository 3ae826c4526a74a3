#![crate_name = "softdel_api"]
#![crate_type = "lib"]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # softdel API
//!
//! This crate exposes all the types shared between the `softdel` core and the
//! persistence engine it sits on.
//!
//! You can import all the useful types and traits by using the prelude module:
//!
//! ```rust
//! use softdel_api::prelude::*;
//! ```
//!
//! ## Types
//!
//! ### Schema
//!
//! - [`Catalog`](crate::prelude::Catalog)
//! - [`ColumnDef`](crate::prelude::ColumnDef)
//! - [`DataTypeKind`](crate::prelude::DataTypeKind)
//! - [`ForeignKeyDef`](crate::prelude::ForeignKeyDef)
//! - [`OnDelete`](crate::prelude::OnDelete)
//! - [`RelationDef`](crate::prelude::RelationDef)
//! - [`RelationKind`](crate::prelude::RelationKind)
//! - [`TableDef`](crate::prelude::TableDef)
//!
//! ### Query
//!
//! - [`Delete`](crate::prelude::Delete)
//! - [`ExecutionOptions`](crate::prelude::ExecutionOptions)
//! - [`Filter`](crate::prelude::Filter)
//! - [`Join`](crate::prelude::Join)
//! - [`Record`](crate::prelude::Record)
//! - [`Select`](crate::prelude::Select)
//! - [`Statement`](crate::prelude::Statement)
//!
//! ### Keys
//!
//! - [`KeyStrategy`](crate::prelude::KeyStrategy)
//!
//! ### Storage
//!
//! - [`Storage`](crate::prelude::Storage)
//! - [`WriteOp`](crate::prelude::WriteOp)
//!
//! ### Errors
//!
//! - [`CascadeError`](crate::prelude::CascadeError)
//! - [`ConfigError`](crate::prelude::ConfigError)
//! - [`GenerationError`](crate::prelude::GenerationError)
//! - [`SessionError`](crate::prelude::SessionError)
//! - [`SoftDelError`](crate::prelude::SoftDelError)
//! - [`SoftDelResult`](crate::prelude::SoftDelResult)
//! - [`StorageError`](crate::prelude::StorageError)

mod error;
mod key;
pub mod prelude;
mod query;
mod schema;
mod storage;
mod value;
