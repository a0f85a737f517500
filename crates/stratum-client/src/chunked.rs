//! The chunked transformation object (§4.7): the same create/delete/read/
//! write/status surface as [`FlatObject`], layered over a growing series of
//! fixed-size child flat objects named `"{name}_{k}"`, so size-changing
//! codecs only ever read-modify-write one chunk instead of the whole
//! logical stream.

use stratum_backend::MetadataRecord;
use stratum_core::{StratumError, TransformationKind, TransformationMode};
use std::sync::Arc;

use crate::dispatch::BackendDispatch;
use crate::flat::FlatObject;
use crate::metadata::MetadataStore;
use crate::stats::Statistics;

pub struct ChunkedObject {
    namespace: String,
    name: String,
    dispatch: Arc<BackendDispatch>,
    metadata: Arc<MetadataStore>,
    stats: Arc<Statistics>,
}

impl ChunkedObject {
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

    fn chunk_name(&self, k: u64) -> String {
        format!("{}_{}", self.name, k)
    }

    fn child(&self, k: u64) -> FlatObject {
        FlatObject::new(
            self.namespace.clone(),
            self.chunk_name(k),
            self.dispatch.clone(),
            self.metadata.clone(),
            self.stats.clone(),
        )
    }

    pub async fn create(
        &self,
        kind: TransformationKind,
        mode: TransformationMode,
        chunk_size: u64,
    ) -> Result<(), StratumError> {
        self.child(0).create(kind, mode).await?;
        let record = MetadataRecord::new_chunked(kind, mode, chunk_size);
        self.metadata.put(&self.namespace, &self.name, &record).await
    }

    pub async fn delete(&self) -> Result<(), StratumError> {
        let record = self.metadata.get(&self.namespace, &self.name).await?;
        let chunk_count = record.chunk_count.unwrap_or(1);
        for k in 0..chunk_count {
            self.child(k).delete().await?;
        }
        self.metadata.delete(&self.namespace, &self.name).await
    }

    /// Write `data` at logical offset `offset`, growing `chunk_count` as
    /// needed. Returns the total bytes written (always `data.len()` on
    /// success — writes never partially fail).
    pub async fn write(&self, offset: u64, data: &[u8]) -> Result<u64, StratumError> {
        let mut record = self.metadata.get(&self.namespace, &self.name).await?;
        let chunk_size = record
            .chunk_size
            .ok_or_else(|| StratumError::Backend("object has no chunk geometry".to_string()))?;
        let mut chunk_count = record.chunk_count.unwrap_or(1);

        let mut logical_offset = offset;
        let mut remaining = data.len() as u64;
        let mut cursor = 0usize;
        let mut bytes_written = 0u64;

        while remaining > 0 {
            let k = logical_offset / chunk_size;
            let local_offset = logical_offset % chunk_size;
            let local_len = remaining.min(chunk_size - local_offset);

            if k >= chunk_count {
                self.child(k)
                    .create(
                        TransformationKind::from_u8(record.transformation_kind)?,
                        TransformationMode::from_u8(record.transformation_mode)?,
                    )
                    .await?;
                chunk_count = k + 1;
            }

            let slice = &data[cursor..cursor + local_len as usize];
            let (written, _, _) = self
                .child(k)
                .write(&[(local_offset, slice.to_vec())])
                .await?;
            bytes_written += written.iter().sum::<u64>();

            logical_offset += local_len;
            remaining -= local_len;
            cursor += local_len as usize;
        }

        record.chunk_count = Some(chunk_count);
        self.metadata.put(&self.namespace, &self.name, &record).await?;
        Ok(bytes_written)
    }

    /// Read `length` bytes from logical `offset`. Stops early (returning
    /// fewer bytes than requested) at the current `chunk_count` boundary;
    /// reads never create chunks.
    pub async fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>, StratumError> {
        let record = self.metadata.get(&self.namespace, &self.name).await?;
        let chunk_size = record
            .chunk_size
            .ok_or_else(|| StratumError::Backend("object has no chunk geometry".to_string()))?;
        let chunk_count = record.chunk_count.unwrap_or(1);

        let mut out = Vec::new();
        let mut logical_offset = offset;
        let mut remaining = length;

        while remaining > 0 {
            let k = logical_offset / chunk_size;
            if k >= chunk_count {
                break;
            }
            let local_offset = logical_offset % chunk_size;
            let local_len = remaining.min(chunk_size - local_offset);

            let result = self.child(k).read(&[(local_len, local_offset)]).await?;
            let (data, n) = result.into_iter().next().unwrap_or((Vec::new(), 0));
            out.extend_from_slice(&data);
            if n < local_len {
                break;
            }

            logical_offset += local_len;
            remaining -= local_len;
        }

        Ok(out)
    }

    /// `(original_size, transformed_size, mtime, chunk_count, chunk_size)`
    /// aggregated across all live chunks.
    pub async fn status(
        &self,
    ) -> Result<(u64, u64, std::time::SystemTime, u64, u64), StratumError> {
        let record = self.metadata.get(&self.namespace, &self.name).await?;
        let chunk_size = record
            .chunk_size
            .ok_or_else(|| StratumError::Backend("object has no chunk geometry".to_string()))?;
        let chunk_count = record.chunk_count.unwrap_or(1);

        let mut original_size = 0u64;
        let mut transformed_size = 0u64;
        let mut mtime = std::time::UNIX_EPOCH;
        for k in 0..chunk_count {
            let (child_mtime, child_original, child_transformed, _) = self.child(k).status().await?;
            original_size += child_original;
            transformed_size += child_transformed;
            if child_mtime > mtime {
                mtime = child_mtime;
            }
        }

        Ok((original_size, transformed_size, mtime, chunk_count, chunk_size))
    }
}
