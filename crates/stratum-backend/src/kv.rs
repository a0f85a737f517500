//! Key-value back-end driver: an in-process `DashMap`, or an optional
//! `sled`-backed driver behind the `persistent-kv` feature.

use std::sync::Arc;

use dashmap::DashMap;
use stratum_core::StratumError;

pub type Result<T> = std::result::Result<T, StratumError>;

/// Metadata/KV storage driver, loaded by module name from configuration.
pub trait KvBackend: Send + Sync {
    fn put(&self, namespace: &str, key: &str, value: Vec<u8>) -> Result<()>;
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>>;
    fn delete(&self, namespace: &str, key: &str) -> Result<()>;
    /// Every `(key, value)` pair in `namespace` whose key starts with `prefix`.
    /// No ordering guarantee, matching §4.3's `iterate` contract.
    fn iterate(&self, namespace: &str, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;
}

/// Reference `KvBackend`: a keyed `DashMap`, mirroring the shape of the
/// teacher's per-peer `MessageStore`/`ComputeStore` but keyed on
/// `(namespace, key)` instead of a peer public key.
#[derive(Clone, Default)]
pub struct MemoryKvBackend {
    entries: Arc<DashMap<(String, String), Vec<u8>>>,
}

impl MemoryKvBackend {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }
}

impl KvBackend for MemoryKvBackend {
    fn put(&self, namespace: &str, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries
            .insert((namespace.to_string(), key.to_string()), value);
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .entries
            .get(&(namespace.to_string(), key.to_string()))
            .map(|v| v.clone()))
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        self.entries
            .remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }

    fn iterate(&self, namespace: &str, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().0 == namespace && entry.key().1.starts_with(prefix))
            .map(|entry| (entry.key().1.clone(), entry.value().clone()))
            .collect())
    }
}

/// `sled`-backed durable `KvBackend`. Keys are namespaced by prefixing the
/// stored key with `{namespace}\0` so a single `sled::Db` serves every
/// namespace without per-namespace trees.
#[cfg(feature = "persistent-kv")]
pub struct SledKvBackend {
    db: sled::Db,
}

#[cfg(feature = "persistent-kv")]
impl SledKvBackend {
    pub fn new(path: &std::path::Path) -> Result<Self> {
        let db = sled::open(path).map_err(|e| StratumError::Backend(e.to_string()))?;
        Ok(Self { db })
    }

    fn storage_key(namespace: &str, key: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(namespace.len() + 1 + key.len());
        out.extend_from_slice(namespace.as_bytes());
        out.push(0);
        out.extend_from_slice(key.as_bytes());
        out
    }
}

#[cfg(feature = "persistent-kv")]
impl KvBackend for SledKvBackend {
    fn put(&self, namespace: &str, key: &str, value: Vec<u8>) -> Result<()> {
        self.db
            .insert(Self::storage_key(namespace, key), value)
            .map_err(|e| StratumError::Backend(e.to_string()))?;
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .db
            .get(Self::storage_key(namespace, key))
            .map_err(|e| StratumError::Backend(e.to_string()))?
            .map(|ivec| ivec.to_vec()))
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        self.db
            .remove(Self::storage_key(namespace, key))
            .map_err(|e| StratumError::Backend(e.to_string()))?;
        Ok(())
    }

    fn iterate(&self, namespace: &str, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mut scan_prefix = namespace.as_bytes().to_vec();
        scan_prefix.push(0);
        scan_prefix.extend_from_slice(prefix.as_bytes());

        let mut out = Vec::new();
        for item in self.db.scan_prefix(&scan_prefix) {
            let (k, v) = item.map_err(|e| StratumError::Backend(e.to_string()))?;
            let full = String::from_utf8_lossy(&k);
            if let Some((_, key)) = full.split_once('\0') {
                out.push((key.to_string(), v.to_vec()));
            }
        }
        Ok(out)
    }
}

/// Load the configured `KvBackend` by module name.
#[cfg_attr(not(feature = "persistent-kv"), allow(unused_variables))]
pub fn load_kv_backend(module: &str, path: &std::path::Path) -> Result<Box<dyn KvBackend>> {
    match module {
        "memory" => Ok(Box::new(MemoryKvBackend::new())),
        #[cfg(feature = "persistent-kv")]
        "sled" => Ok(Box::new(SledKvBackend::new(path)?)),
        other => Err(StratumError::Config(format!(
            "unknown kv backend module: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrip() {
        let kv = MemoryKvBackend::new();
        kv.put("default", "widget", b"payload".to_vec()).unwrap();
        assert_eq!(
            kv.get("default", "widget").unwrap(),
            Some(b"payload".to_vec())
        );
    }

    #[test]
    fn get_missing_key_is_none() {
        let kv = MemoryKvBackend::new();
        assert_eq!(kv.get("default", "missing").unwrap(), None);
    }

    #[test]
    fn delete_removes_entry() {
        let kv = MemoryKvBackend::new();
        kv.put("default", "widget", b"payload".to_vec()).unwrap();
        kv.delete("default", "widget").unwrap();
        assert_eq!(kv.get("default", "widget").unwrap(), None);
    }

    #[test]
    fn iterate_filters_by_namespace_and_prefix() {
        let kv = MemoryKvBackend::new();
        kv.put("ns-a", "obj:1", b"one".to_vec()).unwrap();
        kv.put("ns-a", "obj:2", b"two".to_vec()).unwrap();
        kv.put("ns-a", "other:3", b"three".to_vec()).unwrap();
        kv.put("ns-b", "obj:1", b"four".to_vec()).unwrap();

        let mut matches = kv.iterate("ns-a", "obj:").unwrap();
        matches.sort();
        assert_eq!(
            matches,
            vec![
                ("obj:1".to_string(), b"one".to_vec()),
                ("obj:2".to_string(), b"two".to_vec()),
            ]
        );
    }

    #[test]
    fn put_overwrites_existing_value() {
        let kv = MemoryKvBackend::new();
        kv.put("default", "widget", b"first".to_vec()).unwrap();
        kv.put("default", "widget", b"second".to_vec()).unwrap();
        assert_eq!(
            kv.get("default", "widget").unwrap(),
            Some(b"second".to_vec())
        );
    }
}
