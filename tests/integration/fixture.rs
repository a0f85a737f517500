use std::sync::Arc;

use stratum_backend::{FilesystemObjectBackend, MemoryKvBackend};
use stratum_client::{BackendDispatch, ChunkedObject, FlatObject, MetadataStore, Statistics};
use stratum_core::config::StratumConfig;

/// A fresh single-server, local-backend client stack rooted at a unique
/// temp directory, so parallel tests never collide on disk.
pub struct Harness {
    dispatch: Arc<BackendDispatch>,
    metadata: Arc<MetadataStore>,
    stats: Arc<Statistics>,
}

impl Harness {
    pub fn new(root_suffix: &str) -> Self {
        let config = StratumConfig::default();
        let dispatch = Arc::new(BackendDispatch::new(&config).with_local_backend(
            0,
            Arc::new(
                FilesystemObjectBackend::new(
                    std::env::temp_dir().join(format!("stratum-integration-{root_suffix}")),
                )
                .unwrap(),
            ),
            Arc::new(MemoryKvBackend::new()),
        ));
        let stats = Arc::new(Statistics::new());
        let metadata = Arc::new(MetadataStore::new(dispatch.clone(), stats.clone()));
        Self {
            dispatch,
            metadata,
            stats,
        }
    }

    pub fn flat(&self, name: &str) -> FlatObject {
        self.flat_in("default", name)
    }

    pub fn flat_in(&self, namespace: &str, name: &str) -> FlatObject {
        FlatObject::new(
            namespace,
            name,
            self.dispatch.clone(),
            self.metadata.clone(),
            self.stats.clone(),
        )
    }

    pub fn chunked(&self, name: &str) -> ChunkedObject {
        ChunkedObject::new(
            "default",
            name,
            self.dispatch.clone(),
            self.metadata.clone(),
            self.stats.clone(),
        )
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }
}
