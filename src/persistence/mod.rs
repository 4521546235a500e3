//! Key/value preference persistence
//!
//! Features:
//! - String keys, scalar values (integers, floats, booleans stored as 0/1)
//! - Writes grouped into a `WriteBatch` and committed as one unit
//! - Memory store for tests, JSON file store (native), LocalStorage (web)

#[cfg(not(target_arch = "wasm32"))]
mod json_file;
#[cfg(target_arch = "wasm32")]
mod local_storage;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(not(target_arch = "wasm32"))]
pub use json_file::JsonFileStore;
#[cfg(target_arch = "wasm32")]
pub use local_storage::LocalStorageStore;

/// A stored scalar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Int(i64),
    Float(f64),
}

impl PrefValue {
    pub fn as_int(self) -> Option<i64> {
        match self {
            PrefValue::Int(v) => Some(v),
            PrefValue::Float(_) => None,
        }
    }

    pub fn as_float(self) -> f64 {
        match self {
            PrefValue::Int(v) => v as f64,
            PrefValue::Float(v) => v,
        }
    }
}

/// Errors raised while committing preferences
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("preference file io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("preference encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("preference storage unavailable: {0}")]
    Unavailable(String),
}

/// A single pending write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set(String, PrefValue),
    Delete(String),
}

/// Group of writes that must land together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_int(&mut self, key: impl Into<String>, value: i64) -> &mut Self {
        self.ops.push(WriteOp::Set(key.into(), PrefValue::Int(value)));
        self
    }

    pub fn set_float(&mut self, key: impl Into<String>, value: f64) -> &mut Self {
        self.ops.push(WriteOp::Set(key.into(), PrefValue::Float(value)));
        self
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) -> &mut Self {
        self.set_int(key, i64::from(value))
    }

    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Delete(key.into()));
        self
    }

    /// Move every op of `other` onto the end of this batch
    pub fn append(&mut self, other: WriteBatch) -> &mut Self {
        self.ops.extend(other.ops);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Apply every op to a key/value map
    pub fn apply_to(&self, map: &mut BTreeMap<String, PrefValue>) {
        for op in &self.ops {
            match op {
                WriteOp::Set(key, value) => {
                    map.insert(key.clone(), *value);
                }
                WriteOp::Delete(key) => {
                    map.remove(key);
                }
            }
        }
    }
}

/// Durable key/value store
///
/// Reads come from the store's in-memory view. `commit` must either apply the
/// whole batch or none of it.
pub trait PrefsStore {
    fn get(&self, key: &str) -> Option<PrefValue>;

    fn commit(&mut self, batch: WriteBatch) -> Result<(), PersistError>;

    fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(PrefValue::as_int)
    }

    fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).map(PrefValue::as_float)
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_int(key).map(|v| v == 1)
    }

    fn has_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Commit a batch, logging instead of failing
///
/// In-memory session state stays authoritative when the disk write fails.
pub fn commit_or_log(store: &mut dyn PrefsStore, batch: WriteBatch) {
    if batch.is_empty() {
        return;
    }
    let len = batch.len();
    if let Err(e) = store.commit(batch) {
        log::error!("Failed to persist {} preference writes: {}", len, e);
    }
}

/// In-memory store (tests and sessions without storage)
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, PrefValue>,
    commits: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches committed so far
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PrefsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<PrefValue> {
        self.values.get(key).copied()
    }

    fn commit(&mut self, batch: WriteBatch) -> Result<(), PersistError> {
        batch.apply_to(&mut self.values);
        self.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_applies_in_order() {
        let mut store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.set_int("xp", 10).delete("xp").set_int("xpThreshold", 150);
        store.commit(batch).unwrap();

        assert_eq!(store.get_int("xp"), None);
        assert_eq!(store.get_int("xpThreshold"), Some(150));
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn test_bool_and_float_reads() {
        let mut store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.set_bool("LevelPassed_0", true).set_float("settings_music_volume", 0.25);
        store.commit(batch).unwrap();

        assert_eq!(store.get_bool("LevelPassed_0"), Some(true));
        assert_eq!(store.get_float("settings_music_volume"), Some(0.25));
        // Floats are never read back as integers
        assert_eq!(store.get_int("settings_music_volume"), None);
    }

    #[test]
    fn test_empty_batch_is_not_committed() {
        let mut store = MemoryStore::new();
        commit_or_log(&mut store, WriteBatch::new());
        assert_eq!(store.commit_count(), 0);
    }

    #[test]
    fn test_pref_value_json_shape() {
        let json = serde_json::to_string(&PrefValue::Int(3)).unwrap();
        assert_eq!(json, "3");
        let back: PrefValue = serde_json::from_str("0.5").unwrap();
        assert_eq!(back, PrefValue::Float(0.5));
    }
}
