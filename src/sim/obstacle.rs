//! Obstacles and oscillating movers
//!
//! Obstacles live on scene nodes inside a level. They take damage from
//! projectiles, flash and shake when hit, and die one tick after their health
//! reaches zero. Timed parts (flash, shake, death) are scheduled by the
//! session on the timer wheel; this module only holds the state.

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::scene::{NodeId, SceneGraph};

/// Authored obstacle parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstacleSpec {
    pub health: u32,
    pub xp_reward: u32,
    pub hit_flash_duration: f32,
    pub shake_intensity: f32,
    pub shake_duration: f32,
    pub radius: f32,
}

impl Default for ObstacleSpec {
    fn default() -> Self {
        Self {
            health: 3,
            xp_reward: 10,
            hit_flash_duration: 0.15,
            shake_intensity: 0.1,
            shake_duration: 0.15,
            radius: 0.5,
        }
    }
}

/// Result of `Obstacle::take_damage`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Zero damage, nothing happened
    Ignored,
    Damaged { remaining: u32 },
    /// Health reached zero; the death sequence should start
    Killed,
}

#[derive(Debug, Clone)]
pub struct Obstacle {
    pub node: NodeId,
    pub spec: ObstacleSpec,
    health: u32,
    flashing: bool,
    shaking: bool,
    /// Visual-only displacement while shaking
    shake_offset: Vec3,
}

impl Obstacle {
    pub fn new(node: NodeId, spec: ObstacleSpec) -> Self {
        Self {
            node,
            health: spec.health,
            spec,
            flashing: false,
            shaking: false,
            shake_offset: Vec3::ZERO,
        }
    }

    pub fn health(&self) -> u32 {
        self.health
    }

    pub fn is_flashing(&self) -> bool {
        self.flashing
    }

    pub fn is_shaking(&self) -> bool {
        self.shaking
    }

    pub fn shake_offset(&self) -> Vec3 {
        self.shake_offset
    }

    pub fn take_damage(&mut self, amount: u32) -> HitOutcome {
        if amount == 0 {
            return HitOutcome::Ignored;
        }
        self.health = self.health.saturating_sub(amount);
        self.flashing = true;
        self.shaking = true;
        if self.health == 0 {
            HitOutcome::Killed
        } else {
            HitOutcome::Damaged {
                remaining: self.health,
            }
        }
    }

    pub fn end_flash(&mut self) {
        self.flashing = false;
    }

    pub fn end_shake(&mut self) {
        self.shaking = false;
        self.shake_offset = Vec3::ZERO;
    }

    /// Pick a new random shake offset for this frame
    pub fn jitter<R: Rng>(&mut self, rng: &mut R) {
        if !self.shaking {
            return;
        }
        let i = self.spec.shake_intensity.abs();
        if i <= 0.0 {
            return;
        }
        self.shake_offset = Vec3::new(rng.random_range(-i..=i), rng.random_range(-i..=i), 0.0);
    }

    /// Back to authored health with no visual state
    pub fn reset(&mut self) {
        self.health = self.spec.health;
        self.flashing = false;
        self.end_shake();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MoverAxis {
    #[default]
    Horizontal,
    Vertical,
}

impl MoverAxis {
    fn unit(self) -> Vec3 {
        match self {
            MoverAxis::Horizontal => Vec3::X,
            MoverAxis::Vertical => Vec3::Y,
        }
    }
}

/// Sinusoidal back-and-forth motion in local space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoverSpec {
    pub axis: MoverAxis,
    /// Max offset in local units
    pub amplitude: f32,
    /// Cycles per second
    pub speed: f32,
    /// Radians
    pub phase: f32,
}

impl Default for MoverSpec {
    fn default() -> Self {
        Self {
            axis: MoverAxis::Horizontal,
            amplitude: 1.0,
            speed: 1.0,
            phase: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Mover {
    pub node: NodeId,
    pub spec: MoverSpec,
    origin: Vec3,
    elapsed: f32,
}

impl Mover {
    pub fn new(node: NodeId, spec: MoverSpec, origin: Vec3) -> Self {
        Self {
            node,
            spec,
            origin,
            elapsed: 0.0,
        }
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Restart the oscillation around `origin`
    pub fn reset_motion(&mut self, origin: Vec3) {
        self.origin = origin;
        self.elapsed = 0.0;
    }

    fn offset(&self) -> Vec3 {
        let angle = self.elapsed * std::f32::consts::TAU * self.spec.speed + self.spec.phase;
        self.spec.axis.unit() * (self.spec.amplitude * angle.sin())
    }

    /// Advance and write the new local position
    pub fn update(&mut self, dt: f32, graph: &mut SceneGraph) {
        self.elapsed += dt;
        graph.set_local_translation(self.node, self.origin + self.offset());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::scene::Transform;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_damage_until_killed() {
        let mut obstacle = Obstacle::new(NodeId(0), ObstacleSpec::default());
        assert_eq!(obstacle.take_damage(0), HitOutcome::Ignored);
        assert!(!obstacle.is_flashing());

        assert_eq!(obstacle.take_damage(2), HitOutcome::Damaged { remaining: 1 });
        assert!(obstacle.is_flashing());
        assert_eq!(obstacle.take_damage(5), HitOutcome::Killed);
        assert_eq!(obstacle.health(), 0);

        obstacle.reset();
        assert_eq!(obstacle.health(), 3);
        assert!(!obstacle.is_flashing());
        assert!(!obstacle.is_shaking());
    }

    #[test]
    fn test_jitter_stays_within_intensity() {
        let mut rng = Pcg32::seed_from_u64(7);
        let mut obstacle = Obstacle::new(NodeId(0), ObstacleSpec::default());
        obstacle.take_damage(1);
        for _ in 0..100 {
            obstacle.jitter(&mut rng);
            let o = obstacle.shake_offset();
            assert!(o.x.abs() <= 0.1 && o.y.abs() <= 0.1);
        }
        obstacle.end_shake();
        assert_eq!(obstacle.shake_offset(), Vec3::ZERO);
    }

    #[test]
    fn test_mover_oscillates_around_origin() {
        let mut graph = SceneGraph::new();
        let node = graph.spawn("m", None, Transform::from_xyz(1.0, 2.0, 0.0), true);
        let spec = MoverSpec {
            axis: MoverAxis::Vertical,
            amplitude: 2.0,
            speed: 1.0,
            phase: 0.0,
        };
        let mut mover = Mover::new(node, spec, Vec3::new(1.0, 2.0, 0.0));

        // Quarter cycle: full amplitude
        mover.update(0.25, &mut graph);
        let p = graph.local(node).unwrap().translation;
        assert!((p - Vec3::new(1.0, 4.0, 0.0)).length() < 1e-4);

        mover.reset_motion(Vec3::new(0.0, 0.0, 0.0));
        mover.update(0.5, &mut graph);
        let p = graph.local(node).unwrap().translation;
        assert!(p.length() < 1e-4);
    }
}
