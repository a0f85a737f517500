//! Back-end dispatch: picks the server index for an object name and hands
//! out either a local in-process driver or a pooled connection to the
//! server that owns it (§4.4).

use std::sync::Arc;

use stratum_backend::{KvBackend, ObjectBackend};
use stratum_core::config::StratumConfig;

use crate::pool::ConnectionPool;

/// Everything needed to reach one configured server: its connection pool,
/// and — only when this process also hosts that server's data, e.g. for
/// embedded/single-process testing — local drivers that skip the wire
/// entirely.
pub struct ServerSlot {
    pub pool: ConnectionPool,
    pub object_backend: Option<Arc<dyn ObjectBackend>>,
    pub kv_backend: Option<Arc<dyn KvBackend>>,
}

pub struct BackendDispatch {
    servers: Vec<ServerSlot>,
}

impl BackendDispatch {
    pub fn new(config: &StratumConfig) -> Self {
        let servers = config
            .servers
            .iter()
            .map(|addr| ServerSlot {
                pool: ConnectionPool::new(addr.host.clone(), addr.port, config.pool_max_connections),
                object_backend: None,
                kv_backend: None,
            })
            .collect();
        Self { servers }
    }

    /// Attach local drivers to a server slot, bypassing the wire for that
    /// index. Used when the client runs embedded in the same process as the
    /// backend it would otherwise dial.
    pub fn with_local_backend(
        mut self,
        index: usize,
        object_backend: Arc<dyn ObjectBackend>,
        kv_backend: Arc<dyn KvBackend>,
    ) -> Self {
        let slot = &mut self.servers[index];
        slot.object_backend = Some(object_backend);
        slot.kv_backend = Some(kv_backend);
        self
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    /// `stable_hash(name) mod server_count` — all operations on one object
    /// use this single index; clients never shard a flat object's bytes
    /// across servers.
    pub fn server_index(&self, name: &str) -> usize {
        stable_hash(name) as usize % self.servers.len()
    }

    pub fn slot(&self, index: usize) -> &ServerSlot {
        &self.servers[index]
    }
}

fn stable_hash(name: &str) -> u64 {
    let digest = blake3::hash(name.as_bytes());
    u64::from_le_bytes(digest.as_bytes()[..8].try_into().unwrap())
}
