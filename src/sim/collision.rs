//! Contact detection
//!
//! Produces the three signals the session reacts to: a projectile touching an
//! obstacle, the player touching an obstacle, and the player reaching the
//! level end. Shapes are circles in the XY plane; a host with real physics
//! can skip this and feed contacts through `TickInput` instead.

use glam::Vec3;

use super::level::Stage;
use super::player::Player;
use super::pool::{ActorPool, SlotId};
use super::projectile::Projectile;
use super::scene::NodeId;

/// A gameplay-relevant overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    ProjectileObstacle { projectile: SlotId, obstacle: NodeId },
    PlayerObstacle { obstacle: NodeId },
    /// The player reached the end marker of a level
    LevelEnd { level: usize },
}

/// Circle overlap test in the XY plane
#[inline]
pub fn circles_overlap(a: Vec3, radius_a: f32, b: Vec3, radius_b: f32) -> bool {
    let r = radius_a + radius_b;
    (a.truncate() - b.truncate()).length_squared() <= r * r
}

/// True once a downward-scrolling end marker has come level with the player
#[inline]
pub fn reached_level_end(marker_y: f32, player_y: f32) -> bool {
    marker_y <= player_y
}

/// Every contact in the active level this frame
///
/// Only obstacles active in the hierarchy and projectiles that are in flight
/// (not fading out) take part. Order is stable: projectile hits by slot then
/// node, then player hits by node, then the level end.
pub fn detect_contacts(
    stage: &Stage,
    level: usize,
    player: &Player,
    projectiles: &ActorPool<Projectile>,
    projectile_radius: f32,
) -> Vec<Contact> {
    let mut contacts = Vec::new();
    let Some(lvl) = stage.levels.get(level) else {
        return contacts;
    };
    if !stage.graph.is_active_in_hierarchy(lvl.root) {
        return contacts;
    }

    let live: Vec<(NodeId, Vec3, f32)> = stage
        .obstacles
        .iter()
        .filter(|(node, _)| lvl.contains(&stage.graph, **node))
        .filter(|(node, _)| stage.graph.is_active_in_hierarchy(**node))
        .map(|(node, o)| (*node, stage.graph.world_position(*node), o.spec.radius))
        .collect();

    for (slot, projectile) in projectiles.iter() {
        if !projectile.is_active() || projectile.is_deactivating() {
            continue;
        }
        for &(node, pos, radius) in &live {
            if circles_overlap(projectile.position, projectile_radius, pos, radius) {
                contacts.push(Contact::ProjectileObstacle {
                    projectile: slot,
                    obstacle: node,
                });
            }
        }
    }

    let player_radius = player.tuning().radius;
    for &(node, pos, radius) in &live {
        if circles_overlap(player.position, player_radius, pos, radius) {
            contacts.push(Contact::PlayerObstacle { obstacle: node });
        }
    }

    if let Some(marker) = lvl.end_marker {
        let marker_y = stage.graph.world_position(marker).y;
        if reached_level_end(marker_y, player.position.y) {
            contacts.push(Contact::LevelEnd { level });
        }
    }

    contacts
}
