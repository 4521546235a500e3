//! Audio settings
//!
//! Music volume, sfx volume and a master mute, persisted under their own
//! keys next to the progression ledger.

use serde::{Deserialize, Serialize};

use crate::clamp01;
use crate::persistence::{PrefsStore, WriteBatch, commit_or_log};

/// Persisted key names
pub mod keys {
    pub const MUSIC_VOLUME: &str = "settings_music_volume";
    pub const SFX_VOLUME: &str = "settings_sfx_volume";
    pub const MASTER_MUTED: &str = "settings_master_muted";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Music volume (0.0 - 1.0)
    pub music_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    pub master_muted: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            music_volume: 0.7,
            sfx_volume: 0.7,
            master_muted: false,
        }
    }
}

impl AudioSettings {
    /// Read stored settings, falling back to defaults per key
    pub fn load(store: &dyn PrefsStore) -> Self {
        let defaults = Self::default();
        let settings = Self {
            music_volume: store
                .get_float(keys::MUSIC_VOLUME)
                .map_or(defaults.music_volume, |v| clamp01(v as f32)),
            sfx_volume: store
                .get_float(keys::SFX_VOLUME)
                .map_or(defaults.sfx_volume, |v| clamp01(v as f32)),
            master_muted: store
                .get_bool(keys::MASTER_MUTED)
                .unwrap_or(defaults.master_muted),
        };
        log::info!(
            "Audio settings: music {:.2}, sfx {:.2}, muted {}",
            settings.music_volume,
            settings.sfx_volume,
            settings.master_muted
        );
        settings
    }

    /// Music level to apply (0 while muted)
    pub fn effective_music_volume(&self) -> f32 {
        if self.master_muted { 0.0 } else { self.music_volume }
    }

    /// Sfx level to apply (0 while muted)
    pub fn effective_sfx_volume(&self) -> f32 {
        if self.master_muted { 0.0 } else { self.sfx_volume }
    }

    pub fn set_music_volume(&mut self, volume: f32, store: &mut dyn PrefsStore) {
        self.music_volume = clamp01(volume);
        let mut batch = WriteBatch::new();
        batch.set_float(keys::MUSIC_VOLUME, f64::from(self.music_volume));
        commit_or_log(store, batch);
    }

    pub fn set_sfx_volume(&mut self, volume: f32, store: &mut dyn PrefsStore) {
        self.sfx_volume = clamp01(volume);
        let mut batch = WriteBatch::new();
        batch.set_float(keys::SFX_VOLUME, f64::from(self.sfx_volume));
        commit_or_log(store, batch);
    }

    pub fn set_master_muted(&mut self, muted: bool, store: &mut dyn PrefsStore) {
        self.master_muted = muted;
        let mut batch = WriteBatch::new();
        batch.set_bool(keys::MASTER_MUTED, muted);
        commit_or_log(store, batch);
    }

    pub fn toggle_master_mute(&mut self, store: &mut dyn PrefsStore) {
        self.set_master_muted(!self.master_muted, store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    #[test]
    fn test_defaults_when_store_empty() {
        let store = MemoryStore::new();
        assert_eq!(AudioSettings::load(&store), AudioSettings::default());
    }

    #[test]
    fn test_values_clamped_and_persisted() {
        let mut store = MemoryStore::new();
        let mut settings = AudioSettings::default();
        settings.set_music_volume(1.5, &mut store);
        settings.set_sfx_volume(0.25, &mut store);
        assert_eq!(settings.music_volume, 1.0);

        let loaded = AudioSettings::load(&store);
        assert_eq!(loaded.music_volume, 1.0);
        assert_eq!(loaded.sfx_volume, 0.25);
    }

    #[test]
    fn test_mute_zeroes_effective_volumes() {
        let mut store = MemoryStore::new();
        let mut settings = AudioSettings::default();
        settings.toggle_master_mute(&mut store);
        assert_eq!(settings.effective_music_volume(), 0.0);
        assert_eq!(settings.effective_sfx_volume(), 0.0);
        // Stored levels survive the mute
        assert_eq!(settings.music_volume, 0.7);
        assert!(AudioSettings::load(&store).master_muted);
    }
}
