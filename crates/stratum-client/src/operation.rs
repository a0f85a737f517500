//! A single deferred operation (§3, §4.5): a polymorphic record carrying a
//! strong handle on its target flat object plus the per-op payload, so the
//! object outlives its own queued operations even if the caller drops its
//! own reference before `Batch::execute` runs.

use std::sync::Arc;

use stratum_core::{StratumError, TransformationKind, TransformationMode};

use crate::flat::FlatObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Delete,
    Read,
    Write,
    Status,
}

pub enum OperationPayload {
    Create {
        kind: TransformationKind,
        mode: TransformationMode,
    },
    Delete,
    Read {
        length: u64,
        offset: u64,
    },
    Write {
        offset: u64,
        data: Vec<u8>,
    },
    Status,
}

impl OperationPayload {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationPayload::Create { .. } => OperationKind::Create,
            OperationPayload::Delete => OperationKind::Delete,
            OperationPayload::Read { .. } => OperationKind::Read,
            OperationPayload::Write { .. } => OperationKind::Write,
            OperationPayload::Status => OperationKind::Status,
        }
    }
}

/// What an executed operation produced, for the caller to inspect after
/// `Batch::execute` returns.
#[derive(Debug, Clone)]
pub enum OperationResult {
    Created,
    Deleted,
    Read { data: Vec<u8>, bytes_read: u64 },
    Written { bytes_written: u64 },
    Status { original_size: u64, transformed_size: u64 },
}

/// A queued operation. Holds a strong `Arc<FlatObject>` so the object stays
/// alive for the operation's lifetime regardless of what else drops its
/// handle in the meantime.
pub struct Operation {
    pub(crate) object: Arc<FlatObject>,
    pub(crate) payload: OperationPayload,
    pub(crate) result: Option<Result<OperationResult, StratumError>>,
}

impl Operation {
    pub fn new(object: Arc<FlatObject>, payload: OperationPayload) -> Self {
        Self {
            object,
            payload,
            result: None,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.payload.kind()
    }

    /// The operation's target, used by the batch executor to key its
    /// `(operation_kind, object_key)` partitions.
    pub fn object_key(&self) -> (&str, &str) {
        (self.object.namespace(), self.object.name())
    }

    /// `Some` once `Batch::execute` has run this operation.
    pub fn result(&self) -> Option<&Result<OperationResult, StratumError>> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<Result<OperationResult, StratumError>> {
        self.result
    }
}
