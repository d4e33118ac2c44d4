#![forbid(unsafe_code)]

//! Modal identity.

use std::cell::Cell;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use web_time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for a modal instance within one store.
///
/// Stable for the lifetime of the instance; never reused by the generator
/// that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModalId(u64);

impl ModalId {
    /// Wrap a raw id. Callers that supply their own ids must keep them
    /// distinct from generated ones.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "modal-{}", self.0)
    }
}

impl FromStr for ModalId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("modal-").unwrap_or(s).parse().map(Self)
    }
}

/// Millisecond timestamp in the high bits. Out-of-range timestamps clamp to
/// `u64::MAX` before the shift.
fn seed(since_epoch: Duration) -> u64 {
    u64::try_from(since_epoch.as_millis()).unwrap_or(u64::MAX) << 12
}

/// Monotonic id source: a counter seeded from the wall clock.
///
/// The seed keeps ids from different sessions apart (millisecond timestamp in
/// the high bits); the counter keeps ids within a session unique.
#[derive(Debug)]
pub(crate) struct IdGenerator {
    next: Cell<u64>,
}

impl IdGenerator {
    pub(crate) fn seeded_now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self::starting_at(seed(since_epoch))
    }

    pub(crate) fn starting_at(first: u64) -> Self {
        Self {
            next: Cell::new(first.max(1)),
        }
    }

    pub(crate) fn next_id(&self) -> ModalId {
        let id = self.next.get();
        self.next.set(id.wrapping_add(1).max(1));
        ModalId(id)
    }
}
