//! Sky Volley - level flow and progression core for a vertical scrolling shooter
//!
//! Core modules:
//! - `sim`: Deterministic session core (level flow, snapshots, pools, ledger)
//! - `persistence`: Key/value preference stores with batched commits
//! - `settings`: Audio settings collaborator
//! - `audio`: Sound effect ids and the music fader
//! - `tuning`: Data-driven session and level configuration

pub mod audio;
pub mod persistence;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use persistence::{MemoryStore, PrefsStore, WriteBatch};
pub use settings::AudioSettings;
pub use tuning::SessionConfig;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep used by the headless runner (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// World units per second the active level scrolls downward
    pub const LEVEL_SCROLL_SPEED: f32 = 2.0;
    /// Progress distance used when the end marker starts level with the player
    pub const MIN_PROGRESS_DISTANCE: f32 = 1.0;

    /// Pool defaults
    pub const PROJECTILE_POOL_SIZE: usize = 50;
    pub const EFFECT_POOL_SIZE: usize = 20;
    /// Extra time an effect stays alive after its particle lifetime
    pub const EFFECT_LIFETIME_PAD: f32 = 0.05;
    /// Lifetime used when an effect declares none
    pub const EFFECT_FALLBACK_LIFETIME: f32 = 1.0;
    /// How long the final-level celebration runs (unscaled seconds)
    pub const CONFETTI_DURATION: f32 = 5.0;

    /// Economy defaults
    pub const DEFAULT_XP_THRESHOLD: u32 = 100;
    pub const XP_THRESHOLD_GROWTH: f32 = 1.5;
    /// Fire rate bonus per upgrade, as a fraction of the base rate
    pub const FIRE_RATE_STEP: f32 = 0.1;

    /// Player defaults
    pub const PLAYER_MAX_HEALTH: u32 = 3;
    pub const INVINCIBLE_DURATION: f32 = 3.0;
    pub const INVINCIBLE_BLINK_INTERVAL: f32 = 0.15;
    /// Stars shown on the level complete panel
    pub const MAX_STARS: u32 = 3;

    /// Music is ducked to this fraction of the user level during upgrades
    pub const UPGRADE_MUSIC_MULTIPLIER: f32 = 0.5;
    pub const MUSIC_FADE_DURATION: f32 = 0.5;
}

/// Clamp to [0, 1]
#[inline]
pub fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Linear interpolation with `t` clamped to [0, 1]
#[inline]
pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * clamp01(t)
}
