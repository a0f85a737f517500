//! The metadata store (§4.3): a thin client over `KvBackend`, routing
//! through [`BackendDispatch`] exactly like data operations do — a local
//! call when the owning server's `kv_backend` is attached in-process,
//! otherwise a `KV_PUT`/`KV_GET`/`KV_DELETE` wire round trip.

use std::sync::Arc;

use bytes::Bytes;
use stratum_backend::MetadataRecord;
use stratum_core::wire::{self, ops, Message, MessageType};
use stratum_core::StratumError;

use crate::dispatch::BackendDispatch;
use crate::stats::Statistics;

pub struct MetadataStore {
    dispatch: Arc<BackendDispatch>,
    stats: Arc<Statistics>,
}

impl MetadataStore {
    pub fn new(dispatch: Arc<BackendDispatch>, stats: Arc<Statistics>) -> Self {
        Self { dispatch, stats }
    }

    pub async fn put(
        &self,
        namespace: &str,
        name: &str,
        record: &MetadataRecord,
    ) -> Result<(), StratumError> {
        let idx = self.dispatch.server_index(name);
        let slot = self.dispatch.slot(idx);
        let encoded = record.encode()?;

        if let Some(kv) = &slot.kv_backend {
            kv.put(namespace, name, encoded)?;
            return Ok(());
        }

        let mut conn = slot.pool.pop_connection().await?;
        let request = Message::new(
            MessageType::KvPut,
            0,
            ops::encode_name(namespace),
            vec![ops::encode_kv_put(name, &encoded)],
        );
        if let Err(e) = wire::write_frame(conn.stream_mut(), &request).await {
            conn.discard();
            return Err(e.into());
        }
        match wire::read_reply_until(conn.stream_mut(), 1).await {
            Ok(_) => {
                self.stats.record_wire_round_trip();
                Ok(())
            }
            Err(e) => {
                conn.discard();
                Err(e.into())
            }
        }
    }

    pub async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<MetadataRecord, StratumError> {
        let idx = self.dispatch.server_index(name);
        let slot = self.dispatch.slot(idx);

        if let Some(kv) = &slot.kv_backend {
            let bytes = kv.get(namespace, name)?.ok_or_else(|| StratumError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;
            return MetadataRecord::decode(&bytes);
        }

        let mut conn = slot.pool.pop_connection().await?;
        let request = Message::new(
            MessageType::KvGet,
            0,
            ops::encode_name(namespace),
            vec![ops::encode_kv_get(name)],
        );
        if let Err(e) = wire::write_frame(conn.stream_mut(), &request).await {
            conn.discard();
            return Err(e.into());
        }
        let reply = match wire::read_reply_until(conn.stream_mut(), 1).await {
            Ok(reply) => {
                self.stats.record_wire_round_trip();
                reply
            }
            Err(e) => {
                conn.discard();
                return Err(e.into());
            }
        };

        let raw: Bytes = reply.ops.into_iter().next().unwrap_or_default();
        let value = ops::decode_kv_get_reply(raw)?.ok_or_else(|| StratumError::NotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })?;
        MetadataRecord::decode(&value)
    }

    /// Deleting a name that was never `put` is a [`StratumError::NotFound`],
    /// not a no-op — checked here via [`Self::get`] (itself backed by
    /// `kv.get`, which already distinguishes "missing" from "empty") rather
    /// than trusting the back-end's own idempotent `delete`.
    pub async fn delete(&self, namespace: &str, name: &str) -> Result<(), StratumError> {
        self.get(namespace, name).await?;

        let idx = self.dispatch.server_index(name);
        let slot = self.dispatch.slot(idx);

        if let Some(kv) = &slot.kv_backend {
            kv.delete(namespace, name)?;
            return Ok(());
        }

        let mut conn = slot.pool.pop_connection().await?;
        let request = Message::new(
            MessageType::KvDelete,
            0,
            ops::encode_name(namespace),
            vec![ops::encode_name(name)],
        );
        if let Err(e) = wire::write_frame(conn.stream_mut(), &request).await {
            conn.discard();
            return Err(e.into());
        }
        match wire::read_reply_until(conn.stream_mut(), 1).await {
            Ok(_) => {
                self.stats.record_wire_round_trip();
                Ok(())
            }
            Err(e) => {
                conn.discard();
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_backend::{MemoryKvBackend, MetadataRecord};
    use stratum_core::config::StratumConfig;
    use stratum_core::{TransformationKind, TransformationMode};

    fn store_with_local_backend() -> MetadataStore {
        let config = StratumConfig::default();
        let dispatch = Arc::new(
            BackendDispatch::new(&config).with_local_backend(
                0,
                Arc::new(stratum_backend::FilesystemObjectBackend::new(
                    std::env::temp_dir().join("stratum-metadata-test"),
                ).unwrap()),
                Arc::new(MemoryKvBackend::new()),
            ),
        );
        MetadataStore::new(dispatch, Arc::new(Statistics::new()))
    }

    #[tokio::test]
    async fn put_then_get_round_trips_locally() {
        let store = store_with_local_backend();
        let record = MetadataRecord::new_flat(TransformationKind::Xor, TransformationMode::Client);
        store.put("default", "alpha", &record).await.unwrap();

        let fetched = store.get("default", "alpha").await.unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = store_with_local_backend();
        let err = store.get("default", "missing").await.unwrap_err();
        assert!(matches!(err, StratumError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let store = store_with_local_backend();
        let record = MetadataRecord::new_flat(TransformationKind::None, TransformationMode::Server);
        store.put("default", "alpha", &record).await.unwrap();
        store.delete("default", "alpha").await.unwrap();
        assert!(store.get("default", "alpha").await.is_err());
    }

    #[tokio::test]
    async fn deleting_a_key_that_was_never_put_is_not_found() {
        let store = store_with_local_backend();
        let err = store.delete("default", "missing").await.unwrap_err();
        assert!(matches!(err, StratumError::NotFound { .. }));
    }
}
