//! JSON file preference store (native only)
//!
//! The whole map is rewritten on every commit: write to `<path>.tmp`, then
//! rename over the save file so a crash never leaves a half-written batch.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{PersistError, PrefValue, PrefsStore, WriteBatch};

pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, PrefValue>,
}

impl JsonFileStore {
    /// Open a store, starting empty when the file is missing or unreadable
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(values) => {
                    log::info!("Loaded preferences from {}", path.display());
                    values
                }
                Err(e) => {
                    log::warn!("Ignoring corrupt preference file {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(_) => {
                log::info!("No preference file at {}, starting fresh", path.display());
                BTreeMap::new()
            }
        };
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

impl PrefsStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<PrefValue> {
        self.values.get(key).copied()
    }

    fn commit(&mut self, batch: WriteBatch) -> Result<(), PersistError> {
        let mut next = self.values.clone();
        batch.apply_to(&mut next);

        let json = serde_json::to_string_pretty(&next)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        self.values = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("sky_volley_{}_{}.json", name, std::process::id()));
        let _ = fs::remove_file(&path);
        path
    }

    #[test]
    fn test_commit_survives_reopen() {
        let path = temp_file("reopen");
        {
            let mut store = JsonFileStore::open(&path);
            let mut batch = WriteBatch::new();
            batch.set_int("LastLevel", 2).set_int("xp", 40);
            store.commit(batch).unwrap();
        }

        let store = JsonFileStore::open(&path);
        assert_eq!(store.get_int("LastLevel"), Some(2));
        assert_eq!(store.get_int("xp"), Some(40));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let path = temp_file("corrupt");
        fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::open(&path);
        assert!(store.get("xp").is_none());
        let _ = fs::remove_file(&path);
    }
}
