//! HTTP API handlers — exposes daemon state as JSON.

pub mod status;

use crate::stats::DaemonStats;

#[derive(Clone)]
pub struct ApiState {
    pub stats: DaemonStats,
    pub object_backend_module: String,
    pub kv_backend_module: String,
    pub started_at: std::time::Instant,
}

pub use status::{handle_stats, handle_status};
