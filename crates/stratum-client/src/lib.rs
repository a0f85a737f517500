//! The client-facing library: connection pooling, dispatch across
//! configured servers, metadata lookups, and the flat/chunked/batch object
//! surfaces built on top of them.

pub mod batch;
pub mod chunked;
pub mod dispatch;
pub mod flat;
pub mod metadata;
pub mod operation;
pub mod pool;
pub mod stats;

pub use batch::Batch;
pub use chunked::ChunkedObject;
pub use dispatch::{BackendDispatch, ServerSlot};
pub use flat::FlatObject;
pub use metadata::MetadataStore;
pub use operation::{Operation, OperationKind, OperationPayload, OperationResult};
pub use pool::{ConnectionPool, PooledConnection};
pub use stats::{Statistics, StatisticsSnapshot};
