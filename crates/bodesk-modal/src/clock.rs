#![forbid(unsafe_code)]

//! Time source for deferred work (exit-transition clears, navigation guards).
//!
//! Deadlines are computed from a [`Clock`] and applied when the host calls
//! `tick()`, so tests can drive time explicitly with [`ManualClock`].

use std::fmt;

use web_time::Instant;

/// Monotonic time source.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall-clock time via `web_time::Instant` (native and wasm).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "test-helpers"))]
mod manual {
    use super::{Clock, Instant};
    use std::cell::Cell;
    use std::time::Duration;

    /// A clock that only moves when told to.
    #[derive(Debug)]
    pub struct ManualClock {
        now: Cell<Instant>,
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ManualClock {
        #[must_use]
        pub fn new() -> Self {
            Self {
                now: Cell::new(Instant::now()),
            }
        }

        pub fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.now.get()
        }
    }
}

impl fmt::Debug for dyn Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Clock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn manual_clock_moves_only_on_advance() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now() - t0, Duration::from_millis(250));
    }
}
