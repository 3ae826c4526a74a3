use std::sync::{Arc, Mutex};

use softdel_api::prelude::{ConfigError, GenerationError, SessionError, SoftDelResult};

use crate::clock::{Clock, SystemClock};

/// Custom epoch of the identifiers: 2010-11-04T01:42:54.657Z.
pub const EPOCH_MILLIS: u64 = 1_288_834_974_657;

const SEQUENCE_BITS: u64 = 12;
const WORKER_ID_BITS: u64 = 5;
const DATACENTER_ID_BITS: u64 = 5;
const TIMESTAMP_BITS: u64 = 41;

const WORKER_ID_SHIFT: u64 = SEQUENCE_BITS;
const DATACENTER_ID_SHIFT: u64 = SEQUENCE_BITS + WORKER_ID_BITS;
const TIMESTAMP_SHIFT: u64 = SEQUENCE_BITS + WORKER_ID_BITS + DATACENTER_ID_BITS;

/// Highest sequence number within a single millisecond.
pub const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;
pub const MAX_WORKER_ID: u8 = (1 << WORKER_ID_BITS) - 1;
pub const MAX_DATACENTER_ID: u8 = (1 << DATACENTER_ID_BITS) - 1;
const MAX_ELAPSED: u64 = (1 << TIMESTAMP_BITS) - 1;

/// The fields a distributed identifier is composed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParts {
    /// Milliseconds since the UNIX epoch.
    pub timestamp: u64,
    pub datacenter_id: u8,
    pub worker_id: u8,
    pub sequence: u16,
}

#[derive(Debug, Default)]
struct GeneratorState {
    last_timestamp: u64,
    sequence: u64,
}

/// Generator of 64-bit time-ordered identifiers.
///
/// The layout, from the most significant bit, is:
///
/// - 1 bit, always `0`;
/// - 41 bits of milliseconds elapsed since [`EPOCH_MILLIS`];
/// - 5 bits of datacenter id;
/// - 5 bits of worker id;
/// - 12 bits of sequence within the millisecond.
///
/// The generator is meant to be shared across threads behind an [`Arc`]: every call to
/// [`DistributedIdGenerator::generate`] runs under one exclusive lock, so identifiers
/// produced by the same generator are unique and non-decreasing as long as the clock
/// does not move backwards.
pub struct DistributedIdGenerator {
    datacenter_id: u8,
    worker_id: u8,
    clock: Arc<dyn Clock>,
    state: Mutex<GeneratorState>,
}

impl std::fmt::Debug for DistributedIdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedIdGenerator")
            .field("datacenter_id", &self.datacenter_id)
            .field("worker_id", &self.worker_id)
            .finish_non_exhaustive()
    }
}

impl DistributedIdGenerator {
    /// Creates a generator reading the system clock.
    pub fn new(datacenter_id: u8, worker_id: u8) -> Result<Self, ConfigError> {
        Self::with_clock(datacenter_id, worker_id, Arc::new(SystemClock))
    }

    /// Creates a generator reading the given clock.
    ///
    /// Fails if either id is greater than 31.
    pub fn with_clock(
        datacenter_id: u8,
        worker_id: u8,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        if datacenter_id > MAX_DATACENTER_ID {
            return Err(ConfigError::DatacenterIdOutOfRange(datacenter_id));
        }
        if worker_id > MAX_WORKER_ID {
            return Err(ConfigError::WorkerIdOutOfRange(worker_id));
        }

        Ok(Self {
            datacenter_id,
            worker_id,
            clock,
            state: Mutex::new(GeneratorState::default()),
        })
    }

    /// Creates a generator with datacenter and worker ids set to `0`.
    pub(crate) fn with_default_ids(clock: Arc<dyn Clock>) -> Self {
        Self {
            datacenter_id: 0,
            worker_id: 0,
            clock,
            state: Mutex::new(GeneratorState::default()),
        }
    }

    pub fn datacenter_id(&self) -> u8 {
        self.datacenter_id
    }

    pub fn worker_id(&self) -> u8 {
        self.worker_id
    }

    /// Generates the next identifier.
    ///
    /// When the sequence of the current millisecond is exhausted, the call spins until the
    /// clock moves to the next millisecond. A clock reading older than the last one used is
    /// a [`GenerationError::ClockRegression`]: the caller must not retry it.
    pub fn generate(&self) -> SoftDelResult<u64> {
        let mut state = self.state.lock().map_err(|_| SessionError::LockPoisoned)?;

        let mut now = self.clock.now_millis();
        if now < state.last_timestamp {
            tracing::error!(
                last = state.last_timestamp,
                now,
                "clock moved backwards; refusing to generate id"
            );
            return Err(GenerationError::ClockRegression {
                last: state.last_timestamp,
                now,
            }
            .into());
        }

        let mut sequence = 0;
        if now == state.last_timestamp {
            sequence = (state.sequence + 1) & MAX_SEQUENCE;
            if sequence == 0 {
                tracing::trace!(
                    timestamp = now,
                    "sequence exhausted; waiting for next millisecond"
                );
                now = self.wait_next_millis(state.last_timestamp);
            }
        }

        // the state is left untouched when the timestamp does not fit
        let elapsed = now
            .checked_sub(EPOCH_MILLIS)
            .filter(|elapsed| *elapsed <= MAX_ELAPSED)
            .ok_or(GenerationError::TimestampOutOfRange(now))?;
        state.last_timestamp = now;
        state.sequence = sequence;

        Ok((elapsed << TIMESTAMP_SHIFT)
            | ((self.datacenter_id as u64) << DATACENTER_ID_SHIFT)
            | ((self.worker_id as u64) << WORKER_ID_SHIFT)
            | sequence)
    }

    /// Splits an identifier into its fields.
    pub fn decompose(id: u64) -> IdParts {
        IdParts {
            timestamp: (id >> TIMESTAMP_SHIFT) + EPOCH_MILLIS,
            datacenter_id: ((id >> DATACENTER_ID_SHIFT) & MAX_DATACENTER_ID as u64) as u8,
            worker_id: ((id >> WORKER_ID_SHIFT) & MAX_WORKER_ID as u64) as u8,
            sequence: (id & MAX_SEQUENCE) as u16,
        }
    }

    /// Busy-waits until the clock reads a millisecond after `last`.
    fn wait_next_millis(&self, last: u64) -> u64 {
        loop {
            let now = self.clock.now_millis();
            if now > last {
                return now;
            }
            std::hint::spin_loop();
        }
    }
}
