//! The error taxonomy shared by every Stratum crate.
//!
//! One variant per row of the error table: object/metadata absence, short
//! reads/writes, codec failures, wire framing failures, backend failures,
//! and configuration failures. Library code returns `Result<T, StratumError>`;
//! only binary entry points reach for `anyhow`.

use crate::wire::WireError;

#[derive(Debug, thiserror::Error)]
pub enum StratumError {
    #[error("object or metadata not found: {namespace}/{name}")]
    NotFound { namespace: String, name: String },

    #[error("object already exists: {namespace}/{name}")]
    Exists { namespace: String, name: String },

    #[error("short {op}: requested {requested} bytes, got {actual}")]
    IoShort {
        op: &'static str,
        requested: u64,
        actual: u64,
    },

    #[error("codec failure: {0}")]
    Codec(String),

    #[error("wire protocol error: {0}")]
    Wire(#[from] WireError),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StratumError>;
