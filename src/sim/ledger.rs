//! Progression ledger and upgrade economy
//!
//! The ledger is the in-memory source of truth for xp, the xp threshold,
//! upgrade counters, the resume level and passed-level flags. Every mutating
//! method returns the `WriteBatch` describing what must be persisted, so a
//! single gameplay event always lands as one commit.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_XP_THRESHOLD, XP_THRESHOLD_GROWTH};
use crate::persistence::{PrefsStore, WriteBatch};

/// Persisted key names
pub mod keys {
    pub const LAST_LEVEL: &str = "LastLevel";
    pub const XP: &str = "xp";
    pub const XP_THRESHOLD: &str = "xpThreshold";
    pub const UP_FIRE: &str = "up_fire";
    pub const UP_COUNT: &str = "up_count";
    pub const UP_PEN: &str = "up_pen";
    pub const UP_DMG: &str = "up_dmg";

    pub fn level_passed(index: usize) -> String {
        format!("LevelPassed_{}", index)
    }
}

/// The four upgrade categories, in panel order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpgradeKind {
    FireRate,
    ProjectileCount,
    Damage,
    Penetration,
}

impl UpgradeKind {
    pub const ALL: [UpgradeKind; 4] = [
        UpgradeKind::FireRate,
        UpgradeKind::ProjectileCount,
        UpgradeKind::Damage,
        UpgradeKind::Penetration,
    ];

    /// Panel button index (0..4)
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(&self) -> &'static str {
        match self {
            UpgradeKind::FireRate => "Fire Rate +10%",
            UpgradeKind::ProjectileCount => "Projectile Number +1",
            UpgradeKind::Damage => "Projectile Damage +1",
            UpgradeKind::Penetration => "Projectile Penetration +1",
        }
    }
}

/// Per-category upgrade limits (damage has none)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeCaps {
    pub fire_rate: u32,
    pub projectile_count: u32,
    pub penetration: u32,
}

impl Default for UpgradeCaps {
    fn default() -> Self {
        Self {
            fire_rate: 10,
            projectile_count: 2,
            penetration: 4,
        }
    }
}

impl UpgradeCaps {
    pub fn cap(&self, kind: UpgradeKind) -> Option<u32> {
        match kind {
            UpgradeKind::FireRate => Some(self.fire_rate),
            UpgradeKind::ProjectileCount => Some(self.projectile_count),
            UpgradeKind::Damage => None,
            UpgradeKind::Penetration => Some(self.penetration),
        }
    }
}

/// How many times each upgrade was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpgradeCounters {
    pub fire_rate: u32,
    pub projectile_count: u32,
    pub damage: u32,
    pub penetration: u32,
}

impl UpgradeCounters {
    pub fn get(&self, kind: UpgradeKind) -> u32 {
        match kind {
            UpgradeKind::FireRate => self.fire_rate,
            UpgradeKind::ProjectileCount => self.projectile_count,
            UpgradeKind::Damage => self.damage,
            UpgradeKind::Penetration => self.penetration,
        }
    }

    fn slot_mut(&mut self, kind: UpgradeKind) -> &mut u32 {
        match kind {
            UpgradeKind::FireRate => &mut self.fire_rate,
            UpgradeKind::ProjectileCount => &mut self.projectile_count,
            UpgradeKind::Damage => &mut self.damage,
            UpgradeKind::Penetration => &mut self.penetration,
        }
    }

    pub fn is_maxed(&self, kind: UpgradeKind, caps: &UpgradeCaps) -> bool {
        caps.cap(kind).is_some_and(|cap| self.get(kind) >= cap)
    }

    /// Increment one counter unless it is at its cap
    pub fn try_apply(&mut self, kind: UpgradeKind, caps: &UpgradeCaps) -> bool {
        if self.is_maxed(kind, caps) {
            return false;
        }
        let slot = self.slot_mut(kind);
        *slot = slot.saturating_add(1);
        true
    }

    /// Bring every counter within its cap
    pub fn clamped(mut self, caps: &UpgradeCaps) -> Self {
        for kind in UpgradeKind::ALL {
            if let Some(cap) = caps.cap(kind) {
                let slot = self.slot_mut(kind);
                *slot = (*slot).min(cap);
            }
        }
        self
    }

    fn write_to(&self, batch: &mut WriteBatch) {
        batch
            .set_int(keys::UP_FIRE, i64::from(self.fire_rate))
            .set_int(keys::UP_COUNT, i64::from(self.projectile_count))
            .set_int(keys::UP_PEN, i64::from(self.penetration))
            .set_int(keys::UP_DMG, i64::from(self.damage));
    }
}

/// Threshold after a successful upgrade
pub fn next_threshold(threshold: u32) -> u32 {
    let grown = (threshold as f32 * XP_THRESHOLD_GROWTH).round_ties_even();
    (grown.min(u32::MAX as f32) as u32).max(1)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionLedger {
    xp: u32,
    xp_threshold: u32,
    upgrades: UpgradeCounters,
    last_reached: usize,
    passed: BTreeSet<usize>,
    /// Threshold restored by a full wipe
    base_threshold: u32,
}

impl Default for ProgressionLedger {
    fn default() -> Self {
        Self::new(DEFAULT_XP_THRESHOLD)
    }
}

impl ProgressionLedger {
    pub fn new(base_threshold: u32) -> Self {
        let base_threshold = base_threshold.max(1);
        Self {
            xp: 0,
            xp_threshold: base_threshold,
            upgrades: UpgradeCounters::default(),
            last_reached: 0,
            passed: BTreeSet::new(),
            base_threshold,
        }
    }

    /// Read persisted progression, sanitizing anything out of range
    pub fn load(
        store: &dyn PrefsStore,
        level_count: usize,
        caps: &UpgradeCaps,
        base_threshold: u32,
    ) -> Self {
        let mut ledger = Self::new(base_threshold);

        ledger.passed = (0..level_count)
            .filter(|&i| store.get_bool(&keys::level_passed(i)).unwrap_or(false))
            .collect();

        let max_index = level_count.saturating_sub(1) as i64;
        let last = store.get_int(keys::LAST_LEVEL).unwrap_or(0);
        ledger.last_reached = last.clamp(0, max_index) as usize;

        let read_count = |key: &str| -> u32 {
            store
                .get_int(key)
                .unwrap_or(0)
                .clamp(0, i64::from(u32::MAX)) as u32
        };
        ledger.xp = read_count(keys::XP);
        if let Some(threshold) = store.get_int(keys::XP_THRESHOLD) {
            ledger.xp_threshold = threshold.clamp(1, i64::from(u32::MAX)) as u32;
        }
        ledger.upgrades = UpgradeCounters {
            fire_rate: read_count(keys::UP_FIRE),
            projectile_count: read_count(keys::UP_COUNT),
            damage: read_count(keys::UP_DMG),
            penetration: read_count(keys::UP_PEN),
        }
        .clamped(caps);

        log::info!(
            "Loaded progression: {} of {} levels passed, resume at {}, xp {}/{}",
            ledger.passed.len(),
            level_count,
            ledger.last_reached,
            ledger.xp,
            ledger.xp_threshold
        );
        ledger
    }

    pub fn xp(&self) -> u32 {
        self.xp
    }

    pub fn xp_threshold(&self) -> u32 {
        self.xp_threshold
    }

    pub fn upgrades(&self) -> UpgradeCounters {
        self.upgrades
    }

    pub fn last_reached(&self) -> usize {
        self.last_reached
    }

    pub fn is_passed(&self, index: usize) -> bool {
        self.passed.contains(&index)
    }

    pub fn passed_count(&self) -> usize {
        self.passed.len()
    }

    pub fn threshold_reached(&self) -> bool {
        self.xp >= self.xp_threshold
    }

    /// First unpassed level at or after `start`, wrapping to the front
    ///
    /// `start` is clamped into range first.
    pub fn first_unpassed(&self, start: usize, level_count: usize) -> Option<usize> {
        if level_count == 0 {
            return None;
        }
        let start = start.min(level_count - 1);
        (start..level_count)
            .chain(0..start)
            .find(|i| !self.is_passed(*i))
    }

    /// Flag a level as passed; `None` when it already was
    pub fn mark_passed(&mut self, index: usize) -> Option<WriteBatch> {
        if !self.passed.insert(index) {
            return None;
        }
        let mut batch = WriteBatch::new();
        batch.set_bool(keys::level_passed(index), true);
        Some(batch)
    }

    pub fn set_last_reached(&mut self, index: usize) -> WriteBatch {
        self.last_reached = index;
        let mut batch = WriteBatch::new();
        batch.set_int(keys::LAST_LEVEL, index as i64);
        batch
    }

    /// Add xp; returns the batch and whether the threshold is now reached
    pub fn add_xp(&mut self, amount: u32) -> (WriteBatch, bool) {
        self.xp = self.xp.saturating_add(amount);
        let mut batch = WriteBatch::new();
        batch
            .set_int(keys::XP, i64::from(self.xp))
            .set_int(keys::XP_THRESHOLD, i64::from(self.xp_threshold));
        (batch, self.threshold_reached())
    }

    /// Store new counters, reset xp and grow the threshold
    ///
    /// Counters, xp and threshold are persisted together.
    pub fn commit_upgrade(&mut self, upgrades: UpgradeCounters) -> WriteBatch {
        self.upgrades = upgrades;
        self.xp = 0;
        self.xp_threshold = next_threshold(self.xp_threshold);

        let mut batch = WriteBatch::new();
        self.upgrades.write_to(&mut batch);
        batch
            .set_int(keys::XP, 0)
            .set_int(keys::XP_THRESHOLD, i64::from(self.xp_threshold));
        batch
    }

    /// Zero counters and xp, restore the base threshold, and persist them
    pub fn reset_upgrades_and_xp(&mut self) -> WriteBatch {
        self.upgrades = UpgradeCounters::default();
        self.xp = 0;
        self.xp_threshold = self.base_threshold;

        let mut batch = WriteBatch::new();
        self.upgrades.write_to(&mut batch);
        batch
            .set_int(keys::XP, 0)
            .set_int(keys::XP_THRESHOLD, i64::from(self.xp_threshold));
        batch
    }

    /// Forget passed flags and the resume point
    pub fn clear_level_progress(&mut self, level_count: usize) -> WriteBatch {
        self.passed.clear();
        self.last_reached = 0;

        let mut batch = WriteBatch::new();
        for i in 0..level_count {
            batch.delete(keys::level_passed(i));
        }
        batch.delete(keys::LAST_LEVEL);
        batch
    }

    /// Full progression wipe: every key deleted, every value at its default
    pub fn wipe(&mut self, level_count: usize) -> WriteBatch {
        let mut batch = self.clear_level_progress(level_count);
        self.upgrades = UpgradeCounters::default();
        self.xp = 0;
        self.xp_threshold = self.base_threshold;
        batch
            .delete(keys::UP_FIRE)
            .delete(keys::UP_COUNT)
            .delete(keys::UP_PEN)
            .delete(keys::UP_DMG)
            .delete(keys::XP)
            .delete(keys::XP_THRESHOLD);
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use proptest::prelude::*;

    #[test]
    fn test_threshold_growth() {
        assert_eq!(next_threshold(100), 150);
        assert_eq!(next_threshold(150), 225);
        // 225 * 1.5 = 337.5 rounds to even
        assert_eq!(next_threshold(225), 338);
        assert_eq!(next_threshold(1), 2);
        assert!(next_threshold(0) >= 1);
    }

    #[test]
    fn test_caps_enforced() {
        let caps = UpgradeCaps::default();
        let mut counters = UpgradeCounters::default();
        assert!(counters.try_apply(UpgradeKind::ProjectileCount, &caps));
        assert!(counters.try_apply(UpgradeKind::ProjectileCount, &caps));
        assert!(!counters.try_apply(UpgradeKind::ProjectileCount, &caps));
        assert_eq!(counters.projectile_count, 2);

        for _ in 0..50 {
            assert!(counters.try_apply(UpgradeKind::Damage, &caps));
        }
        assert!(!counters.is_maxed(UpgradeKind::Damage, &caps));
    }

    #[test]
    fn test_first_unpassed_wraps() {
        let mut ledger = ProgressionLedger::default();
        ledger.mark_passed(1);
        ledger.mark_passed(2);
        assert_eq!(ledger.first_unpassed(1, 3), Some(0));
        assert_eq!(ledger.first_unpassed(0, 3), Some(0));
        // Out-of-range start clamps to the last level
        assert_eq!(ledger.first_unpassed(7, 3), Some(0));
        ledger.mark_passed(0);
        assert_eq!(ledger.first_unpassed(0, 3), None);
        assert_eq!(ledger.first_unpassed(0, 0), None);
    }

    #[test]
    fn test_mark_passed_is_idempotent() {
        let mut ledger = ProgressionLedger::default();
        assert!(ledger.mark_passed(0).is_some());
        assert!(ledger.mark_passed(0).is_none());
        assert_eq!(ledger.passed_count(), 1);
    }

    #[test]
    fn test_load_sanitizes_values() {
        let mut store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch
            .set_int(keys::LAST_LEVEL, 9)
            .set_int(keys::XP, -5)
            .set_int(keys::XP_THRESHOLD, 0)
            .set_int(keys::UP_FIRE, 40)
            .set_int(keys::UP_DMG, 7)
            .set_bool(keys::level_passed(1), true)
            .set_bool(keys::level_passed(5), true);
        store.commit(batch).unwrap();

        let ledger = ProgressionLedger::load(&store, 3, &UpgradeCaps::default(), 100);
        assert_eq!(ledger.last_reached(), 2);
        assert_eq!(ledger.xp(), 0);
        assert_eq!(ledger.xp_threshold(), 1);
        assert_eq!(ledger.upgrades().fire_rate, 10);
        assert_eq!(ledger.upgrades().damage, 7);
        assert!(ledger.is_passed(1));
        // Flags beyond the level list are ignored
        assert!(!ledger.is_passed(5));
    }

    #[test]
    fn test_wipe_deletes_every_key() {
        let mut store = MemoryStore::new();
        let mut ledger = ProgressionLedger::default();
        store.commit(ledger.mark_passed(0).unwrap()).unwrap();
        store.commit(ledger.set_last_reached(1)).unwrap();
        store.commit(ledger.add_xp(40).0).unwrap();
        let mut counters = ledger.upgrades();
        counters.try_apply(UpgradeKind::Damage, &UpgradeCaps::default());
        store.commit(ledger.commit_upgrade(counters)).unwrap();

        store.commit(ledger.wipe(2)).unwrap();
        assert!(store.is_empty());
        assert_eq!(ledger.xp(), 0);
        assert_eq!(ledger.xp_threshold(), 100);
        assert_eq!(ledger.last_reached(), 0);
        assert_eq!(ledger.upgrades(), UpgradeCounters::default());
    }

    proptest! {
        #[test]
        fn prop_crossing_reported_only_at_threshold(
            amounts in prop::collection::vec(0u32..60, 1..20)
        ) {
            let mut ledger = ProgressionLedger::default();
            for amount in amounts {
                let before = ledger.xp();
                let (_, crossed) = ledger.add_xp(amount);
                prop_assert_eq!(ledger.xp(), before + amount);
                prop_assert_eq!(crossed, ledger.xp() >= ledger.xp_threshold());
                if crossed {
                    let threshold = ledger.xp_threshold();
                    ledger.commit_upgrade(ledger.upgrades());
                    prop_assert_eq!(ledger.xp(), 0);
                    prop_assert!(ledger.xp_threshold() > threshold);
                }
                prop_assert!(ledger.xp() < ledger.xp_threshold());
            }
        }
    }
}
