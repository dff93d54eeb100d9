// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time sources for the broker.
//!
//! Group change timestamps live in microseconds since the epoch, so the
//! trait is microsecond-first and millisecond readings derive from it. The
//! fake clock moves by hand, which keeps polling and cache-expiry tests off
//! the wall clock.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A clock the runtime schedules and timestamps against.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic reading for interval arithmetic.
    fn now(&self) -> Instant;

    /// Microseconds since the epoch.
    fn epoch_us(&self) -> i64;

    fn epoch_ms(&self) -> i64 {
        self.epoch_us() / 1000
    }
}

/// Real system clock
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_us(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as i64
    }
}

struct FakeNow {
    instant: Instant,
    epoch_us: i64,
}

/// Hand-driven clock for tests. Both readings advance together so interval
/// checks and timestamp checks stay consistent.
#[derive(Clone)]
pub struct FakeClock {
    now: Arc<Mutex<FakeNow>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(FakeNow {
                instant: Instant::now(),
                epoch_us: 1_000_000_000,
            })),
        }
    }

    /// Move time forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock();
        now.instant += duration;
        now.epoch_us += duration.as_micros() as i64;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.now.lock().instant
    }

    fn epoch_us(&self) -> i64 {
        self.now.lock().epoch_us
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
