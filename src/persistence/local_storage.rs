//! LocalStorage preference store (WASM only)
//!
//! The map is kept under a single LocalStorage key, so one `set_item` call
//! commits a whole batch.

use std::collections::BTreeMap;

use super::{PersistError, PrefValue, PrefsStore, WriteBatch};

pub struct LocalStorageStore {
    values: BTreeMap<String, PrefValue>,
}

impl LocalStorageStore {
    /// LocalStorage key
    const STORAGE_KEY: &'static str = "sky_volley_prefs";

    fn storage() -> Option<web_sys::Storage> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
    }

    /// Load preferences from LocalStorage
    pub fn load() -> Self {
        if let Some(storage) = Self::storage() {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                if let Ok(values) = serde_json::from_str(&json) {
                    log::info!("Loaded preferences from LocalStorage");
                    return Self { values };
                }
            }
        }

        log::info!("No stored preferences, starting fresh");
        Self {
            values: BTreeMap::new(),
        }
    }
}

impl PrefsStore for LocalStorageStore {
    fn get(&self, key: &str) -> Option<PrefValue> {
        self.values.get(key).copied()
    }

    fn commit(&mut self, batch: WriteBatch) -> Result<(), PersistError> {
        let mut next = self.values.clone();
        batch.apply_to(&mut next);

        let storage = Self::storage()
            .ok_or_else(|| PersistError::Unavailable("LocalStorage missing".to_string()))?;
        let json = serde_json::to_string(&next)?;
        storage
            .set_item(Self::STORAGE_KEY, &json)
            .map_err(|_| PersistError::Unavailable("set_item rejected".to_string()))?;

        self.values = next;
        Ok(())
    }
}
