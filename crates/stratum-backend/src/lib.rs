//! stratum-backend — the storage-side trait seams (`ObjectBackend`,
//! `KvBackend`) and their reference drivers, plus the metadata record they
//! both persist.

pub mod kv;
pub mod metadata;
pub mod object;
pub mod serverside;

pub use kv::{load_kv_backend, KvBackend, MemoryKvBackend};
pub use metadata::MetadataRecord;
pub use object::{load_object_backend, FilesystemObjectBackend, ObjectBackend, ObjectHandle, ObjectStatus};
pub use serverside::{server_read, server_write};
