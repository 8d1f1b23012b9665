// SPDX-License-Identifier: MIT OR Apache-2.0

//! A mockable monotonic time source.
//!
//! The pipeline and node lifecycle never call [`std::time::Instant::now`] directly;
//! every timestamp flows through a [`Clock`] so that tests can advance time
//! deterministically (see [`crate::testkit::VirtualClock`]).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic time source.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// The current instant, as seen by this clock.
    fn now(&self) -> Instant;
}

/// The real wall-clock, backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A shared, cloneable handle to a [`Clock`] implementation.
pub type SharedClock = Arc<dyn Clock>;

#[must_use]
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

/// A clock whose time can be advanced programmatically, for virtual-cluster tests.
///
/// Tracks elapsed nanoseconds since construction on top of a fixed base
/// [`Instant`], so `now()` stays monotonic even as it is advanced out of
/// step with real time.
#[derive(Debug)]
pub struct MockClock {
    base: Instant,
    elapsed_nanos: AtomicU64,
}

impl MockClock {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: Instant::now(),
            elapsed_nanos: AtomicU64::new(0),
        })
    }

    /// Advance the clock by `duration`, returning the new elapsed time.
    pub fn advance(&self, duration: Duration) -> Duration {
        let added = duration.as_nanos().min(u128::from(u64::MAX)) as u64;
        let total = self.elapsed_nanos.fetch_add(added, Ordering::SeqCst) + added;
        Duration::from_nanos(total)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self {
            base: Instant::now(),
            elapsed_nanos: AtomicU64::new(0),
        }
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }
}
