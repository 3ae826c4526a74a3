//! This module contains the primary key generation subsystem.
//!
//! - [`DistributedIdGenerator`]: time-ordered 64-bit identifiers.
//! - [`compact_identifier`]: short random textual identifiers.
//! - [`KeyStrategyRegistry`]: selects the strategy used for each table.
//! - [`generate_with_retry`]: guards any strategy against collisions with existing rows.

mod compact;
mod distributed;
mod retry;
mod strategy;

pub use self::compact::compact_identifier;
pub use self::distributed::{
    DistributedIdGenerator, EPOCH_MILLIS, IdParts, MAX_DATACENTER_ID, MAX_SEQUENCE, MAX_WORKER_ID,
};
pub use self::retry::generate_with_retry;
pub use self::strategy::{
    CustomGenerator, KeyStrategyParams, KeyStrategyRegistry, KeyStrategySettings,
};
