//! Data-driven session configuration
//!
//! Everything a host can tweak without recompiling: pool sizes, economy
//! defaults, anchors, per-entity tuning and the level layouts themselves.
//! All structs deserialize from JSON with every field optional.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::sim::ledger::UpgradeCaps;
use crate::sim::obstacle::{MoverAxis, MoverSpec, ObstacleSpec};
use crate::sim::scene::{Pose, Transform};

/// Player movement, firing and health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    /// Seconds between shots before upgrades
    pub fire_interval: f32,
    /// Projectiles per shot before upgrades
    pub projectile_count: u32,
    /// Horizontal spacing between projectiles in one shot
    pub projectile_spread: f32,
    pub projectile_damage: u32,
    /// Obstacles a projectile can pass through before upgrades
    pub projectile_penetration: u32,
    pub caps: UpgradeCaps,
    pub max_health: u32,
    pub invincible_duration: f32,
    pub blink_interval: f32,
    /// Drag-follow smoothing factor
    pub smoothing: f32,
    /// Horizontal movement limit
    pub clamp_x: f32,
    pub radius: f32,
    /// Muzzle offset from the player position
    pub fire_offset: Vec3,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            fire_interval: 0.2,
            projectile_count: 1,
            projectile_spread: 0.35,
            projectile_damage: 1,
            projectile_penetration: 1,
            caps: UpgradeCaps::default(),
            max_health: PLAYER_MAX_HEALTH,
            invincible_duration: INVINCIBLE_DURATION,
            blink_interval: INVINCIBLE_BLINK_INTERVAL,
            smoothing: 10.0,
            clamp_x: 2.5,
            radius: 0.4,
            fire_offset: Vec3::new(0.0, 0.5, 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileTuning {
    /// Units per second, straight up
    pub speed: f32,
    pub lifetime: f32,
    /// Delay between a projectile being spent and it returning to the pool
    pub trail_fade: f32,
    pub radius: f32,
}

impl Default for ProjectileTuning {
    fn default() -> Self {
        Self {
            speed: 10.0,
            lifetime: 3.0,
            trail_fade: 0.2,
            radius: 0.1,
        }
    }
}

/// Death effect particle timing
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectTuning {
    /// Emission duration plus particle lifetime; `None` uses the fallback
    pub lifetime: Option<f32>,
}

impl EffectTuning {
    /// How long one effect instance stays active
    pub fn active_time(&self) -> f32 {
        match self.lifetime {
            Some(lifetime) => lifetime.max(0.0) + EFFECT_LIFETIME_PAD,
            None => EFFECT_FALLBACK_LIFETIME,
        }
    }
}

/// Top-level session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub scroll_speed: f32,
    pub projectile_pool_size: usize,
    pub effect_pool_size: usize,
    /// Threshold used at first launch and after a full wipe
    pub xp_threshold: u32,
    /// Where the active level's root is placed when it starts
    pub level_start_anchor: Option<Pose>,
    /// Where the player stands at level start
    pub player_start: Option<Vec3>,
    /// Wipe progress and jump straight into this level
    pub debug_start_level: Option<usize>,
    /// Where the final-level confetti plays
    pub confetti_anchor: Option<Vec3>,
    pub seed: u64,
    pub player: PlayerTuning,
    pub projectile: ProjectileTuning,
    /// `None` disables the effect pool
    pub effect: Option<EffectTuning>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scroll_speed: LEVEL_SCROLL_SPEED,
            projectile_pool_size: PROJECTILE_POOL_SIZE,
            effect_pool_size: EFFECT_POOL_SIZE,
            xp_threshold: DEFAULT_XP_THRESHOLD,
            level_start_anchor: Some(Pose::default()),
            player_start: Some(Vec3::new(0.0, -4.0, 0.0)),
            debug_start_level: None,
            confetti_anchor: None,
            seed: 0x5eed,
            player: PlayerTuning::default(),
            projectile: ProjectileTuning::default(),
            effect: Some(EffectTuning::default()),
        }
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn default_true() -> bool {
    true
}

/// One authored node in a level layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeBlueprint {
    pub name: String,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub obstacle: Option<ObstacleSpec>,
    #[serde(default)]
    pub mover: Option<MoverSpec>,
    /// Crossing this node's height completes the level
    #[serde(default)]
    pub end_marker: bool,
    #[serde(default)]
    pub children: Vec<NodeBlueprint>,
}

impl NodeBlueprint {
    pub fn new(name: impl Into<String>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            transform,
            active: true,
            obstacle: None,
            mover: None,
            end_marker: false,
            children: Vec::new(),
        }
    }

    pub fn with_obstacle(mut self, spec: ObstacleSpec) -> Self {
        self.obstacle = Some(spec);
        self
    }

    pub fn with_mover(mut self, spec: MoverSpec) -> Self {
        self.mover = Some(spec);
        self
    }

    pub fn with_child(mut self, child: NodeBlueprint) -> Self {
        self.children.push(child);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn end_marker(name: impl Into<String>, y: f32) -> Self {
        let mut node = Self::new(name, Transform::from_xyz(0.0, y, 0.0));
        node.end_marker = true;
        node
    }
}

/// An authored level: a root transform plus its node tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelBlueprint {
    pub name: String,
    #[serde(default)]
    pub root: Transform,
    #[serde(default)]
    pub nodes: Vec<NodeBlueprint>,
}

impl LevelBlueprint {
    pub fn from_json(json: &str) -> Result<Vec<Self>, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Generated layouts used by the native runner and tests
///
/// Level `n` has `n + 2` rows of obstacles (every other row moving), with
/// the end marker above the last row. Roots are authored off to the side so
/// the start anchor visibly relocates them.
pub fn demo_levels(count: usize) -> Vec<LevelBlueprint> {
    (0..count)
        .map(|n| {
            let rows = n + 2;
            let mut nodes = Vec::with_capacity(rows + 1);
            for row in 0..rows {
                let y = 3.0 + row as f32 * 2.5;
                let mut group = NodeBlueprint::new(
                    format!("row_{}", row),
                    Transform::from_xyz(0.0, y, 0.0),
                );
                for col in 0..3 {
                    let x = (col as f32 - 1.0) * 1.5;
                    let mut obstacle = NodeBlueprint::new(
                        format!("obstacle_{}_{}", row, col),
                        Transform::from_xyz(x, 0.0, 0.0),
                    )
                    .with_obstacle(ObstacleSpec {
                        health: 1 + (n as u32) + (row as u32 % 2),
                        ..ObstacleSpec::default()
                    });
                    if row % 2 == 1 {
                        obstacle = obstacle.with_mover(MoverSpec {
                            axis: MoverAxis::Horizontal,
                            amplitude: 0.5,
                            speed: 0.5,
                            phase: col as f32,
                        });
                    }
                    group = group.with_child(obstacle);
                }
                nodes.push(group);
            }
            nodes.push(NodeBlueprint::end_marker(
                "level_end",
                3.0 + rows as f32 * 2.5,
            ));

            LevelBlueprint {
                name: format!("Level {}", n + 1),
                root: Transform {
                    translation: Vec3::new(20.0 * (n as f32 + 1.0), 0.0, 0.0),
                    rotation: Quat::IDENTITY,
                    scale: Vec3::ONE,
                },
                nodes,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = SessionConfig::from_json("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.projectile_pool_size, 50);
        assert_eq!(config.player.caps.fire_rate, 10);
    }

    #[test]
    fn test_partial_json_overrides() {
        let config = SessionConfig::from_json(
            r#"{ "scroll_speed": 3.5, "player": { "max_health": 5 }, "effect": null }"#,
        )
        .unwrap();
        assert_eq!(config.scroll_speed, 3.5);
        assert_eq!(config.player.max_health, 5);
        assert_eq!(config.player.fire_interval, 0.2);
        assert!(config.effect.is_none());
    }

    #[test]
    fn test_effect_active_time() {
        assert_eq!(EffectTuning { lifetime: None }.active_time(), 1.0);
        let t = EffectTuning { lifetime: Some(0.5) }.active_time();
        assert!((t - 0.55).abs() < 1e-6);
    }

    #[test]
    fn test_level_blueprint_json() {
        let levels = LevelBlueprint::from_json(
            r#"[{ "name": "one", "nodes": [
                { "name": "rock", "obstacle": { "health": 2 } },
                { "name": "end", "end_marker": true, "active": false }
            ] }]"#,
        )
        .unwrap();
        assert_eq!(levels.len(), 1);
        assert!(levels[0].nodes[0].active);
        assert_eq!(levels[0].nodes[0].obstacle.as_ref().unwrap().health, 2);
        assert!(levels[0].nodes[1].end_marker);
        assert!(!levels[0].nodes[1].active);
    }

    #[test]
    fn test_demo_levels_have_end_markers() {
        let levels = demo_levels(3);
        assert_eq!(levels.len(), 3);
        for level in &levels {
            assert!(level.nodes.iter().any(|n| n.end_marker));
        }
    }
}
