//! Process-wide statistics counters (§4.10).
//!
//! Plain `AtomicU64` fields updated with `Ordering::Relaxed` fetch-adds at
//! the same call sites a C original would update its global counters —
//! after each successful back-end call and each wire round-trip.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Statistics {
    pub bytes_read: AtomicU64,
    pub bytes_written: AtomicU64,
    pub backend_calls: AtomicU64,
    pub wire_round_trips: AtomicU64,
    pub errors: AtomicU64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
        self.backend_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self, bytes: u64) {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        self.backend_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wire_round_trip(&self) {
        self.wire_round_trips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            backend_calls: self.backend_calls.load(Ordering::Relaxed),
            wire_round_trips: self.wire_round_trips.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StatisticsSnapshot {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub backend_calls: u64,
    pub wire_round_trips: u64,
    pub errors: u64,
}
