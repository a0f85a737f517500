//! Daemon-side request counters, updated by `stratumd`'s dispatcher and
//! surfaced read-only through the `/api/stats` handler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
}

#[derive(Clone, Default)]
pub struct DaemonStats {
    inner: Arc<Counters>,
}

impl DaemonStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.inner.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes_read(&self, n: u64) {
        self.inner.bytes_read.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_bytes_written(&self, n: u64) {
        self.inner.bytes_written.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DaemonStatsSnapshot {
        DaemonStatsSnapshot {
            requests: self.inner.requests.load(Ordering::Relaxed),
            bytes_read: self.inner.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.inner.bytes_written.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct DaemonStatsSnapshot {
    pub requests: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}
