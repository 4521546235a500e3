//! Pooled projectile and effect actors

use glam::Vec3;

use super::pool::PooledActor;

/// What a projectile does after touching an obstacle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileHit {
    /// Inactive or already fading out; the hit does not count
    Ignored,
    /// Damage dealt, projectile keeps flying
    PassedThrough,
    /// Damage dealt and penetration used up; start the trail fade
    Spent,
}

#[derive(Debug, Clone)]
pub struct Projectile {
    active: bool,
    deactivating: bool,
    pub position: Vec3,
    damage: u32,
    penetration: u32,
    penetration_left: u32,
    /// Scaled time of the last return to the pool
    last_deactivate_time: f32,
}

impl Default for Projectile {
    fn default() -> Self {
        Self {
            active: false,
            deactivating: false,
            position: Vec3::ZERO,
            damage: 1,
            penetration: 1,
            penetration_left: 1,
            last_deactivate_time: -100.0,
        }
    }
}

impl Projectile {
    /// Place, arm and activate
    pub fn launch(&mut self, position: Vec3, damage: u32, penetration: u32) {
        self.position = position;
        self.active = true;
        self.deactivating = false;
        self.initialize(damage, penetration);
    }

    pub fn initialize(&mut self, damage: u32, penetration: u32) {
        self.damage = damage;
        self.penetration = penetration.max(1);
        self.penetration_left = self.penetration;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_deactivating(&self) -> bool {
        self.deactivating
    }

    pub fn damage(&self) -> u32 {
        self.damage
    }

    pub fn penetration_left(&self) -> u32 {
        self.penetration_left
    }

    pub fn last_deactivate_time(&self) -> f32 {
        self.last_deactivate_time
    }

    /// Fly straight up
    pub fn advance(&mut self, speed: f32, dt: f32) {
        if self.active {
            self.position.y += speed * dt;
        }
    }

    /// Count one obstacle contact against the penetration budget
    pub fn register_hit(&mut self) -> ProjectileHit {
        if !self.active || self.deactivating {
            return ProjectileHit::Ignored;
        }
        self.penetration_left = self.penetration_left.saturating_sub(1);
        if self.penetration_left == 0 {
            self.deactivating = true;
            ProjectileHit::Spent
        } else {
            ProjectileHit::PassedThrough
        }
    }

    /// Enter the trail fade; false when already fading or inactive
    pub fn begin_deactivate(&mut self) -> bool {
        if !self.active || self.deactivating {
            return false;
        }
        self.deactivating = true;
        true
    }

    /// Return to the pool at the origin
    pub fn finish_deactivate(&mut self, now: f32) {
        self.last_deactivate_time = now;
        self.active = false;
        self.deactivating = false;
        self.position = Vec3::ZERO;
    }
}

impl PooledActor for Projectile {
    fn is_in_use(&self) -> bool {
        self.active
    }

    fn release(&mut self, now: f32) {
        self.finish_deactivate(now);
    }
}

/// A one-shot visual effect (e.g. obstacle death burst)
#[derive(Debug, Clone, Default)]
pub struct Effect {
    active: bool,
    pub position: Vec3,
    started_at: f32,
}

impl Effect {
    pub fn play(&mut self, position: Vec3, now: f32) {
        self.position = position;
        self.started_at = now;
        self.active = true;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn started_at(&self) -> f32 {
        self.started_at
    }

    pub fn stop(&mut self) {
        self.active = false;
    }
}

impl PooledActor for Effect {
    fn is_in_use(&self) -> bool {
        self.active
    }

    fn release(&mut self, _now: f32) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_penetration_budget() {
        let mut p = Projectile::default();
        p.launch(Vec3::ZERO, 2, 2);
        assert_eq!(p.register_hit(), ProjectileHit::PassedThrough);
        assert_eq!(p.register_hit(), ProjectileHit::Spent);
        assert!(p.is_deactivating());
        // Still visible while the trail fades, but no longer hits
        assert!(p.is_in_use());
        assert_eq!(p.register_hit(), ProjectileHit::Ignored);
    }

    #[test]
    fn test_zero_penetration_is_at_least_one() {
        let mut p = Projectile::default();
        p.launch(Vec3::ZERO, 1, 0);
        assert_eq!(p.penetration_left(), 1);
        assert_eq!(p.register_hit(), ProjectileHit::Spent);
    }

    #[test]
    fn test_begin_deactivate_once() {
        let mut p = Projectile::default();
        p.launch(Vec3::new(1.0, 1.0, 0.0), 1, 1);
        assert!(p.begin_deactivate());
        assert!(!p.begin_deactivate());

        p.finish_deactivate(2.5);
        assert!(!p.is_in_use());
        assert_eq!(p.position, Vec3::ZERO);
        assert_eq!(p.last_deactivate_time(), 2.5);
        assert!(!p.begin_deactivate());
    }

    #[test]
    fn test_advance_moves_up_only_when_active() {
        let mut p = Projectile::default();
        p.advance(10.0, 1.0);
        assert_eq!(p.position, Vec3::ZERO);
        p.launch(Vec3::ZERO, 1, 1);
        p.advance(10.0, 0.5);
        assert_eq!(p.position, Vec3::new(0.0, 5.0, 0.0));
    }
}
