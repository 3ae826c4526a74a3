//! Wall clock abstraction used to stamp timestamps and compose distributed identifiers.

use std::time::{SystemTime, UNIX_EPOCH};

/// A source of the current time, in milliseconds since the UNIX epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// [`Clock`] backed by the operating system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        // a system time before the epoch reads as the epoch itself
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default()
    }
}
