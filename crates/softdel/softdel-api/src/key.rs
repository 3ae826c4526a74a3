//! Primary key strategies and the errors raised while configuring or running them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::DataTypeKind;

/// Length of a hyphenated UUID.
pub const FULL_IDENTIFIER_LENGTH: usize = 36;
/// Minimum length of a compact identifier.
pub const MIN_COMPACT_LENGTH: usize = 8;
/// Maximum length of a compact identifier.
pub const MAX_COMPACT_LENGTH: usize = 32;

/// Strategy used to generate primary keys.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// Engine native auto-increment; no value is generated up front.
    #[default]
    Sequential,
    /// Random 128-bit UUID in its hyphenated textual form.
    FullIdentifier,
    /// Random value, lowercase base-32 encoded, truncated to the configured length.
    CompactIdentifier,
    /// Time-ordered 64-bit distributed identifier.
    Distributed,
    /// User supplied generator.
    Custom,
}

impl KeyStrategy {
    /// Whether keys produced by this strategy can collide and need an existence check.
    pub fn is_collision_prone(&self) -> bool {
        !matches!(self, KeyStrategy::Sequential)
    }

    /// Whether a primary key column of type `data_type` can store the keys of this strategy.
    ///
    /// `compact_length` is the configured compact identifier length.
    pub fn accepts_column(&self, data_type: DataTypeKind, compact_length: usize) -> bool {
        match self {
            KeyStrategy::Sequential | KeyStrategy::Distributed => data_type.is_integer(),
            KeyStrategy::FullIdentifier => data_type.fits_text(FULL_IDENTIFIER_LENGTH),
            KeyStrategy::CompactIdentifier => data_type.fits_text(compact_length),
            // the custom generator output is opaque
            KeyStrategy::Custom => true,
        }
    }
}

/// Errors raised when configuring key generation.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ConfigError {
    #[error("Compact identifier length must be between 8 and 32, got {0}")]
    CompactLengthOutOfRange(usize),
    #[error("Datacenter id must be between 0 and 31, got {0}")]
    DatacenterIdOutOfRange(u8),
    #[error("Column '{column}' of table '{table}' is not compatible with key strategy {strategy:?}")]
    IncompatibleKeyColumn {
        table: String,
        column: String,
        strategy: KeyStrategy,
    },
    #[error("Maximum retry count must be at least 1")]
    InvalidRetryCount,
    #[error("Custom key strategy requires a generator function")]
    MissingCustomGenerator,
    #[error("Table '{0}' has no primary key column")]
    MissingPrimaryKey(String),
    #[error("Deletion column '{0}' is not defined by any table")]
    UnknownDeletionColumn(String),
    #[error("Worker id must be between 0 and 31, got {0}")]
    WorkerIdOutOfRange(u8),
}

/// Errors raised while generating keys.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum GenerationError {
    #[error("Clock moved backwards: last timestamp {last}, current timestamp {now}")]
    ClockRegression { last: u64, now: u64 },
    #[error("Custom key generator failed: {0}")]
    Custom(String),
    #[error("Could not generate a unique key for table '{table}' after {attempts} attempts")]
    Exhausted { table: String, attempts: u32 },
    #[error("Timestamp {0} cannot be represented in a distributed identifier")]
    TimestampOutOfRange(u64),
}
