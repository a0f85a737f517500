//! The packed metadata record persisted per transformation object (§3, §6).
//!
//! Encoded with `bincode` rather than the BSON a JULEA-compatible peer would
//! expect on the wire — see DESIGN.md for why that substitution is safe
//! here.

use serde::{Deserialize, Serialize};
use stratum_core::{StratumError, TransformationKind, TransformationMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub transformation_kind: u8,
    pub transformation_mode: u8,
    pub original_size: u64,
    pub transformed_size: u64,
    pub chunk_count: Option<u64>,
    pub chunk_size: Option<u64>,
}

impl MetadataRecord {
    pub fn new_flat(kind: TransformationKind, mode: TransformationMode) -> Self {
        Self {
            transformation_kind: kind as u8,
            transformation_mode: mode as u8,
            original_size: 0,
            transformed_size: 0,
            chunk_count: None,
            chunk_size: None,
        }
    }

    pub fn new_chunked(kind: TransformationKind, mode: TransformationMode, chunk_size: u64) -> Self {
        Self {
            transformation_kind: kind as u8,
            transformation_mode: mode as u8,
            original_size: 0,
            transformed_size: 0,
            chunk_count: Some(1),
            chunk_size: Some(chunk_size),
        }
    }

    pub fn kind(&self) -> Result<TransformationKind, StratumError> {
        TransformationKind::from_u8(self.transformation_kind)
    }

    pub fn mode(&self) -> Result<TransformationMode, StratumError> {
        TransformationMode::from_u8(self.transformation_mode)
    }

    pub fn encode(&self) -> Result<Vec<u8>, StratumError> {
        bincode::serialize(self).map_err(|e| StratumError::Backend(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StratumError> {
        bincode::deserialize(bytes).map_err(|e| StratumError::Backend(e.to_string()))
    }
}
