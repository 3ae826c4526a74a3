//! Prelude exposes all the types for `softdel` crate.

pub use softdel_api::prelude::*;

pub use crate::clock::{Clock, SystemClock};
pub use crate::keys::{
    CustomGenerator, DistributedIdGenerator, IdParts, KeyStrategyParams, KeyStrategyRegistry,
    KeyStrategySettings, compact_identifier, generate_with_retry,
};
pub use crate::memory::MemoryStorage;
pub use crate::session::{
    CommitSummary, Detachment, Entity, EntityKey, EntityState, FlushHook, Session,
    StatementInterceptor,
};
pub use crate::soft_delete::{
    CascadeManager, IgnoredTableSettings, SoftDelete, SoftDeleteFilter, SoftDeleteHook,
    SoftDeleteSettings, TimestampColumns, configure_cascade,
};
