//! Player entity
//!
//! Holds position, health, invincibility and the upgrade counters mirrored
//! from the ledger. Combat stats are always derived from base tuning plus
//! counters, never accumulated.

use glam::Vec3;

use super::ledger::{UpgradeCaps, UpgradeCounters, UpgradeKind};
use crate::consts::FIRE_RATE_STEP;
use crate::lerp;
use crate::tuning::PlayerTuning;

/// Combat stats derived from tuning and upgrade counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerEconomyState {
    pub shots_per_second: f32,
    pub projectile_count: u32,
    pub damage: u32,
    pub penetration: u32,
}

impl PlayerEconomyState {
    pub fn derive(tuning: &PlayerTuning, upgrades: &UpgradeCounters) -> Self {
        let base_rate = if tuning.fire_interval.abs() <= f32::EPSILON {
            1.0
        } else {
            1.0 / tuning.fire_interval
        };
        Self {
            // Additive: every upgrade adds 10% of the base rate
            shots_per_second: base_rate * (1.0 + FIRE_RATE_STEP * upgrades.fire_rate as f32),
            projectile_count: tuning.projectile_count.max(1) + upgrades.projectile_count,
            damage: tuning.projectile_damage.max(1).saturating_add(upgrades.damage),
            penetration: tuning.projectile_penetration.max(1) + upgrades.penetration,
        }
    }
}

/// Result of `Player::take_damage`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Invincible or zero damage
    Ignored,
    /// Still alive; an invincibility window starts
    Hurt { health: u32 },
    Died,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub position: Vec3,
    tuning: PlayerTuning,
    health: u32,
    invincible: bool,
    visible: bool,
    target_x: f32,
    shooting: bool,
    next_fire_time: f32,
    upgrades: UpgradeCounters,
    economy: PlayerEconomyState,
}

impl Player {
    pub fn new(tuning: PlayerTuning, position: Vec3) -> Self {
        let upgrades = UpgradeCounters::default();
        let economy = PlayerEconomyState::derive(&tuning, &upgrades);
        Self {
            position,
            health: tuning.max_health,
            tuning,
            invincible: false,
            visible: true,
            target_x: position.x,
            shooting: false,
            next_fire_time: 0.0,
            upgrades,
            economy,
        }
    }

    pub fn tuning(&self) -> &PlayerTuning {
        &self.tuning
    }

    pub fn health(&self) -> u32 {
        self.health
    }

    pub fn max_health(&self) -> u32 {
        self.tuning.max_health
    }

    pub fn is_invincible(&self) -> bool {
        self.invincible
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_shooting(&self) -> bool {
        self.shooting
    }

    pub fn economy(&self) -> PlayerEconomyState {
        self.economy
    }

    pub fn upgrades(&self) -> UpgradeCounters {
        self.upgrades
    }

    pub fn upgrade_count(&self, kind: UpgradeKind) -> u32 {
        self.upgrades.get(kind)
    }

    pub fn upgrade_cap(&self, kind: UpgradeKind) -> Option<u32> {
        self.tuning.caps.cap(kind)
    }

    pub fn caps(&self) -> &UpgradeCaps {
        &self.tuning.caps
    }

    pub fn is_maxed(&self, kind: UpgradeKind) -> bool {
        self.upgrades.is_maxed(kind, &self.tuning.caps)
    }

    /// Full health, no invincibility, visible, idle at the current position
    pub fn reset_player(&mut self) {
        self.health = self.tuning.max_health;
        self.invincible = false;
        self.visible = true;
        self.shooting = false;
        self.target_x = self.position.x;
    }

    /// Place at `position` and stop following the old drag target
    pub fn teleport(&mut self, position: Vec3) {
        self.position = position;
        self.target_x = position.x;
    }

    pub fn take_damage(&mut self, amount: u32) -> DamageOutcome {
        if self.invincible || amount == 0 {
            return DamageOutcome::Ignored;
        }
        self.health = self.health.saturating_sub(amount);
        if self.health == 0 {
            DamageOutcome::Died
        } else {
            self.invincible = true;
            DamageOutcome::Hurt {
                health: self.health,
            }
        }
    }

    pub fn toggle_blink(&mut self) {
        self.visible = !self.visible;
    }

    pub fn end_invincibility(&mut self) {
        self.invincible = false;
        self.visible = true;
    }

    /// Replace counters (clamped to caps) and recompute combat stats
    pub fn load_upgrade_state(&mut self, upgrades: UpgradeCounters) {
        self.upgrades = upgrades.clamped(&self.tuning.caps);
        self.economy = PlayerEconomyState::derive(&self.tuning, &self.upgrades);
    }

    pub fn try_apply_upgrade(&mut self, kind: UpgradeKind) -> bool {
        if !self.upgrades.try_apply(kind, &self.tuning.caps) {
            return false;
        }
        self.economy = PlayerEconomyState::derive(&self.tuning, &self.upgrades);
        true
    }

    /// Pointer x while held, `None` when released
    pub fn set_pointer(&mut self, pointer_x: Option<f32>) {
        match pointer_x {
            Some(x) => {
                let clamp = self.tuning.clamp_x.abs();
                self.target_x = x.clamp(-clamp, clamp);
                self.shooting = true;
            }
            None => self.shooting = false,
        }
    }

    /// Ease toward the drag target
    pub fn update_movement(&mut self, dt: f32) {
        self.position.x = lerp(self.position.x, self.target_x, dt * self.tuning.smoothing);
    }

    /// Spawn points for a shot if one is due at `now`
    pub fn fire(&mut self, now: f32) -> Option<Vec<Vec3>> {
        if !self.shooting || now < self.next_fire_time {
            return None;
        }
        self.next_fire_time = now + 1.0 / self.economy.shots_per_second;

        let count = self.economy.projectile_count;
        let half = (count as f32 - 1.0) * 0.5;
        let muzzle = self.position + self.tuning.fire_offset;
        Some(
            (0..count)
                .map(|i| muzzle + Vec3::X * ((i as f32 - half) * self.tuning.projectile_spread))
                .collect(),
        )
    }
}
