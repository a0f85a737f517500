//! The flat transformation object (§4.6): `create`/`delete`/`read`/`write`/
//! `status` over a single back-end object with a codec applied.
//!
//! All three read/write branches the module names (whole-object
//! read-modify-write, in-place partial, and server-delegated) collapse into
//! one code path here: [`access_read`]/[`access_write`] always route through
//! [`stratum_backend::server_read`]/[`server_write`] — in-process when this
//! server's data lives locally, over the wire otherwise — and that function
//! is already mode-aware (it no-ops for `Client` mode, reconstructs for
//! `Server` mode, and re-encodes/decodes in place for `Transport` mode). The
//! client only has two decisions left: whether it must collapse its queued
//! sub-operations into a single whole-object request first (true for
//! non-partial-accessible codecs under `Client`/`Transport` mode; `Server`
//! mode never needs it, since the far side already slices), and whether to
//! run its own `apply(ClientRead/ClientWrite)` pass over what comes back —
//! which is always safe to call unconditionally, since the direction table
//! resolves it to a no-op exactly when `Server` mode made it redundant.

use bytes::Bytes;
use stratum_backend::{MetadataRecord, ObjectBackend};
use stratum_core::config::SafetyConfig;
use stratum_core::transform::{self, TransformationCaller};
use stratum_core::wire::{self, ops, Message, MessageType, WireTransformation, FLAG_SAFETY_NETWORK, FLAG_SAFETY_STORAGE};
use stratum_core::{StratumError, Transformation, TransformationKind, TransformationMode};

use crate::dispatch::{BackendDispatch, ServerSlot};
use crate::metadata::MetadataStore;
use crate::stats::Statistics;
use std::sync::Arc;

fn safety_flags(safety: SafetyConfig) -> u32 {
    match safety {
        SafetyConfig::None => 0,
        SafetyConfig::Network => FLAG_SAFETY_NETWORK,
        SafetyConfig::Storage => FLAG_SAFETY_STORAGE,
    }
}

pub struct FlatObject {
    namespace: String,
    name: String,
    dispatch: Arc<BackendDispatch>,
    metadata: Arc<MetadataStore>,
    stats: Arc<Statistics>,
}

impl FlatObject {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        dispatch: Arc<BackendDispatch>,
        metadata: Arc<MetadataStore>,
        stats: Arc<Statistics>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            dispatch,
            metadata,
            stats,
        }
    }

    fn slot(&self) -> &ServerSlot {
        let idx = self.dispatch.server_index(&self.name);
        self.dispatch.slot(idx)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create the back-end object and its initial metadata record, using
    /// [`SafetyConfig::Network`] — the default for a standalone create (see
    /// [`create_with_safety`](Self::create_with_safety) for the batch
    /// escalation rule in §4.5).
    pub async fn create(
        &self,
        kind: TransformationKind,
        mode: TransformationMode,
    ) -> Result<(), StratumError> {
        self.create_with_safety(kind, mode, SafetyConfig::Network).await
    }

    pub async fn create_with_safety(
        &self,
        kind: TransformationKind,
        mode: TransformationMode,
        safety: SafetyConfig,
    ) -> Result<(), StratumError> {
        let record = MetadataRecord::new_flat(kind, mode);
        self.metadata.put(&self.namespace, &self.name, &record).await?;

        let slot = self.slot();
        if let Some(backend) = &slot.object_backend {
            backend.create(&self.namespace, &self.name)?;
            return Ok(());
        }

        let flags = safety_flags(safety);
        let mut conn = slot.pool.pop_connection().await?;
        let request = Message::new(
            MessageType::TransformationObjectCreate,
            flags,
            ops::encode_object_ref(&self.namespace, &self.name),
            vec![Bytes::new()],
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

    /// Delete the metadata record, then the back-end object. Order matters:
    /// a data delete failing after the metadata is gone leaves the object
    /// effectively gone already, which is acceptable.
    pub async fn delete(&self) -> Result<(), StratumError> {
        self.metadata.delete(&self.namespace, &self.name).await?;

        let slot = self.slot();
        if let Some(backend) = &slot.object_backend {
            return backend.delete(&self.namespace, &self.name);
        }

        let mut conn = slot.pool.pop_connection().await?;
        let request = Message::new(
            MessageType::TransformationObjectDelete,
            0,
            ops::encode_object_ref(&self.namespace, &self.name),
            vec![Bytes::new()],
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

    /// Queued sub-reads `(length, offset)` → `(data, bytes_read)` per op, in
    /// the order requested.
    pub async fn read(&self, reads: &[(u64, u64)]) -> Result<Vec<(Vec<u8>, u64)>, StratumError> {
        let record = self.metadata.get(&self.namespace, &self.name).await?;
        let transformation = Transformation::new(record.kind()?, record.mode()?);

        let whole = transform::need_whole_object(&transformation, TransformationCaller::ClientRead)
            && transformation.mode() != TransformationMode::Server;

        let access_reads: Vec<(u64, u64)> = if whole {
            if record.transformed_size == 0 {
                let zero = reads.iter().map(|_| (Vec::new(), 0)).collect();
                return Ok(zero);
            }
            vec![(record.transformed_size, 0)]
        } else {
            reads.to_vec()
        };

        let server_results = self.access_read(&transformation, &record, &access_reads).await?;
        self.stats.record_read(server_results.iter().map(|(_, n)| n).sum());

        if whole {
            let (raw, _) = &server_results[0];
            let plain = transform::apply(&transformation, TransformationCaller::ClientRead, raw, 0)?.data;
            if (plain.len() as u64) < record.original_size {
                return Err(StratumError::Codec(format!(
                    "decode produced {} bytes, expected at least {} (original_size)",
                    plain.len(),
                    record.original_size
                )));
            }
            Ok(reads
                .iter()
                .map(|&(len, off)| {
                    let avail = (plain.len() as u64).saturating_sub(off);
                    let eff = len.min(avail) as usize;
                    let start = off as usize;
                    (plain[start..start + eff].to_vec(), eff as u64)
                })
                .collect())
        } else {
            reads
                .iter()
                .zip(server_results)
                .map(|(&(_, off), (raw, n))| {
                    let out = transform::apply(&transformation, TransformationCaller::ClientRead, &raw, off)?;
                    Ok((out.data, n))
                })
                .collect()
        }
    }

    /// Queued sub-writes `(offset, data)` → `(bytes_written per op,
    /// new original_size, new transformed_size)`.
    pub async fn write(
        &self,
        writes: &[(u64, Vec<u8>)],
    ) -> Result<(Vec<u64>, u64, u64), StratumError> {
        let mut record = self.metadata.get(&self.namespace, &self.name).await?;
        let transformation = Transformation::new(record.kind()?, record.mode()?);
        let bytes_written: Vec<u64> = writes.iter().map(|(_, data)| data.len() as u64).collect();

        let whole = transform::need_whole_object(&transformation, TransformationCaller::ClientWrite)
            && transformation.mode() != TransformationMode::Server;

        if whole {
            let original_size = record.original_size;
            let mut w = if original_size > 0 {
                self.read(&[(original_size, 0)])
                    .await?
                    .into_iter()
                    .next()
                    .map(|(data, _)| data)
                    .unwrap_or_default()
            } else {
                Vec::new()
            };

            let new_size = writes
                .iter()
                .map(|(off, data)| off + data.len() as u64)
                .chain(std::iter::once(original_size))
                .max()
                .unwrap_or(0);
            w.resize(new_size as usize, 0);
            for (off, data) in writes {
                let start = *off as usize;
                w[start..start + data.len()].copy_from_slice(data);
            }

            let encoded = transform::apply(&transformation, TransformationCaller::ClientWrite, &w, 0)?;
            self.access_write(&transformation, &mut record, &[(encoded.offset, encoded.data)])
                .await?;
            // For `Client` mode the server only ever sees ciphertext and
            // can't recover the plaintext length on its own; `Transport`
            // mode's decode already derives the same value, so this is a
            // no-op there and authoritative here.
            record.original_size = new_size;
        } else {
            let mut wire_writes = Vec::with_capacity(writes.len());
            for (off, data) in writes {
                let out = transform::apply(&transformation, TransformationCaller::ClientWrite, data, *off)?;
                wire_writes.push((out.offset, out.data));
            }
            self.access_write(&transformation, &mut record, &wire_writes).await?;
        }

        self.metadata.put(&self.namespace, &self.name, &record).await?;
        self.stats.record_write(bytes_written.iter().sum());
        Ok((bytes_written, record.original_size, record.transformed_size))
    }

    /// `(mtime, original_size, transformed_size, kind)`. Sizes and kind come
    /// from the metadata record, not the back-end's physical file size.
    pub async fn status(
        &self,
    ) -> Result<(std::time::SystemTime, u64, u64, TransformationKind), StratumError> {
        let record = self.metadata.get(&self.namespace, &self.name).await?;
        let slot = self.slot();

        let mtime = if let Some(backend) = &slot.object_backend {
            let handle = backend.open(&self.namespace, &self.name)?;
            backend.status(&handle)?.mtime
        } else {
            let mut conn = slot.pool.pop_connection().await?;
            let request = Message::new(
                MessageType::TransformationObjectStatus,
                0,
                ops::encode_object_ref(&self.namespace, &self.name),
                vec![Bytes::new()],
            );
            wire::write_frame(conn.stream_mut(), &request).await?;
            let reply = wire::read_reply_until(conn.stream_mut(), 1).await?;
            self.stats.record_wire_round_trip();
            let _ = reply;
            std::time::SystemTime::now()
        };

        Ok((mtime, record.original_size, record.transformed_size, record.kind()?))
    }

    async fn access_read(
        &self,
        transformation: &Transformation,
        record: &MetadataRecord,
        reads: &[(u64, u64)],
    ) -> Result<Vec<(Vec<u8>, u64)>, StratumError> {
        let slot = self.slot();
        if let Some(backend) = &slot.object_backend {
            let handle = backend.open(&self.namespace, &self.name)?;
            return stratum_backend::server_read(backend.as_ref(), &handle, transformation, record, reads);
        }

        let wt = WireTransformation::new(transformation.kind() as u8, transformation.mode() as u8);
        let request_ops = reads
            .iter()
            .map(|&(len, off)| {
                ops::encode_transformation_read(len, off, wt, record.original_size, record.transformed_size)
            })
            .collect();
        let mut conn = slot.pool.pop_connection().await?;
        let request = Message::new(
            MessageType::TransformationObjectRead,
            0,
            ops::encode_object_ref(&self.namespace, &self.name),
            request_ops,
        );
        if let Err(e) = wire::write_frame(conn.stream_mut(), &request).await {
            conn.discard();
            return Err(e.into());
        }
        let reply = match wire::read_reply_until(conn.stream_mut(), reads.len() as u32).await {
            Ok(reply) => {
                self.stats.record_wire_round_trip();
                reply
            }
            Err(e) => {
                conn.discard();
                return Err(e.into());
            }
        };

        reply
            .ops
            .into_iter()
            .map(|op| {
                let (_, _, _, _, data) = ops::decode_transformation_write(op)?;
                let n = data.len() as u64;
                Ok((data.to_vec(), n))
            })
            .collect()
    }

    async fn access_write(
        &self,
        transformation: &Transformation,
        record: &mut MetadataRecord,
        writes: &[(u64, Vec<u8>)],
    ) -> Result<(), StratumError> {
        let slot = self.slot();
        if let Some(backend) = &slot.object_backend {
            let handle = backend.open(&self.namespace, &self.name)?;
            return stratum_backend::server_write(backend.as_ref(), &handle, transformation, record, writes);
        }

        let wt = WireTransformation::new(transformation.kind() as u8, transformation.mode() as u8);
        let request_ops = writes
            .iter()
            .map(|(off, data)| {
                ops::encode_transformation_write(*off, wt, record.original_size, record.transformed_size, data)
            })
            .collect();
        let mut conn = slot.pool.pop_connection().await?;
        let request = Message::new(
            MessageType::TransformationObjectWrite,
            0,
            ops::encode_object_ref(&self.namespace, &self.name),
            request_ops,
        );
        if let Err(e) = wire::write_frame(conn.stream_mut(), &request).await {
            conn.discard();
            return Err(e.into());
        }
        let reply = match wire::read_reply_until(conn.stream_mut(), writes.len() as u32).await {
            Ok(reply) => {
                self.stats.record_wire_round_trip();
                reply
            }
            Err(e) => {
                conn.discard();
                return Err(e.into());
            }
        };

        // The server reports the sizes resulting from the *last* sub-write
        // applied; every reply op carries the same post-write sizes.
        if let Some(op) = reply.ops.into_iter().next_back() {
            let (_, _, original_size, transformed_size, _) = ops::decode_transformation_write(op)?;
            record.original_size = original_size;
            record.transformed_size = transformed_size;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_backend::{FilesystemObjectBackend, MemoryKvBackend};
    use stratum_core::config::StratumConfig;

    fn object(name: &str, root_suffix: &str) -> FlatObject {
        let config = StratumConfig::default();
        let dispatch = Arc::new(BackendDispatch::new(&config).with_local_backend(
            0,
            Arc::new(
                FilesystemObjectBackend::new(
                    std::env::temp_dir().join(format!("stratum-flat-test-{root_suffix}")),
                )
                .unwrap(),
            ),
            Arc::new(MemoryKvBackend::new()),
        ));
        let stats = Arc::new(Statistics::new());
        let metadata = Arc::new(MetadataStore::new(dispatch.clone(), stats.clone()));
        FlatObject::new("default", name, dispatch, metadata, stats)
    }

    #[tokio::test]
    async fn xor_client_mode_partial_write_then_read() {
        let obj = object("alpha", "xor-client");
        obj.create(TransformationKind::Xor, TransformationMode::Client)
            .await
            .unwrap();
        obj.write(&[(0, b"HELLO".to_vec())]).await.unwrap();
        let result = obj.read(&[(5, 0)]).await.unwrap();
        assert_eq!(result[0].0, b"HELLO");
    }

    #[tokio::test]
    async fn rle_client_mode_whole_object_rmw() {
        let obj = object("alpha", "rle-client");
        obj.create(TransformationKind::Rle, TransformationMode::Client)
            .await
            .unwrap();
        obj.write(&[(0, b"AAAAAAAA".to_vec())]).await.unwrap();
        obj.write(&[(2, b"BB".to_vec())]).await.unwrap();
        let result = obj.read(&[(8, 0)]).await.unwrap();
        assert_eq!(result[0].0, b"AABBAAAA");
    }

    #[tokio::test]
    async fn rle_server_mode_whole_object_rmw_through_server_read_write() {
        let obj = object("alpha", "rle-server");
        obj.create(TransformationKind::Rle, TransformationMode::Server)
            .await
            .unwrap();
        obj.write(&[(0, b"CCCCCCCC".to_vec())]).await.unwrap();
        obj.write(&[(4, b"DD".to_vec())]).await.unwrap();
        let result = obj.read(&[(8, 0)]).await.unwrap();
        assert_eq!(result[0].0, b"CCCCDDCC");
    }

    #[tokio::test]
    async fn xor_transport_mode_round_trips() {
        let obj = object("alpha", "xor-transport");
        obj.create(TransformationKind::Xor, TransformationMode::Transport)
            .await
            .unwrap();
        obj.write(&[(0, b"TRANSPORT".to_vec())]).await.unwrap();
        let result = obj.read(&[(9, 0)]).await.unwrap();
        assert_eq!(result[0].0, b"TRANSPORT");
    }

    #[tokio::test]
    async fn reads_past_original_size_are_truncated() {
        let obj = object("alpha", "truncate-read");
        obj.create(TransformationKind::None, TransformationMode::Client)
            .await
            .unwrap();
        obj.write(&[(0, b"hi".to_vec())]).await.unwrap();
        let result = obj.read(&[(100, 0)]).await.unwrap();
        assert_eq!(result[0].0, b"hi");
        assert_eq!(result[0].1, 2);
    }

    #[tokio::test]
    async fn delete_then_read_is_not_found() {
        let obj = object("alpha", "delete-flow");
        obj.create(TransformationKind::None, TransformationMode::Client)
            .await
            .unwrap();
        obj.write(&[(0, b"data".to_vec())]).await.unwrap();
        obj.delete().await.unwrap();
        assert!(obj.read(&[(4, 0)]).await.is_err());
    }

    #[tokio::test]
    async fn deleting_an_object_that_was_never_created_is_not_found() {
        let obj = object("alpha", "delete-never-created");
        let err = obj.delete().await.unwrap_err();
        assert!(matches!(err, StratumError::NotFound { .. }));
    }

    #[tokio::test]
    async fn deleting_twice_is_not_found_the_second_time() {
        let obj = object("alpha", "delete-twice");
        obj.create(TransformationKind::None, TransformationMode::Client)
            .await
            .unwrap();
        obj.delete().await.unwrap();
        let err = obj.delete().await.unwrap_err();
        assert!(matches!(err, StratumError::NotFound { .. }));
    }
}
