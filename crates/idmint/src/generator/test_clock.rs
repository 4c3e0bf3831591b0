//! Deterministic clocks shared by the generator tests.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::TimeSource;

/// A clock frozen at a single instant.
pub(crate) struct MockTime {
    millis: u64,
}

impl MockTime {
    pub(crate) fn at(millis: u64) -> Self {
        Self { millis }
    }
}

impl TimeSource for MockTime {
    fn current_millis(&self) -> u64 {
        self.millis
    }
}

/// A shareable clock that tests advance (or rewind) by hand, including from
/// another thread while a generator spin-waits.
#[derive(Clone)]
pub(crate) struct AtomicClock {
    now: Arc<AtomicU64>,
}

impl AtomicClock {
    pub(crate) fn at(millis: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(millis)),
        }
    }

    pub(crate) fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    pub(crate) fn rewind(&self, millis: u64) {
        self.now.fetch_sub(millis, Ordering::SeqCst);
    }
}

impl TimeSource for AtomicClock {
    fn current_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A clock that replays a scripted list of readings, repeating the last one
/// once the script runs out.
#[derive(Clone)]
pub(crate) struct SteppingClock {
    values: Arc<Vec<u64>>,
    index: Arc<AtomicUsize>,
}

impl SteppingClock {
    pub(crate) fn with_values(values: Vec<u64>) -> Self {
        Self {
            values: Arc::new(values),
            index: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl TimeSource for SteppingClock {
    fn current_millis(&self) -> u64 {
        let index = self.index.fetch_add(1, Ordering::SeqCst);
        let clamped = index.min(self.values.len() - 1);
        self.values[clamped]
    }
}
