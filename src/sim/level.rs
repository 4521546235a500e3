//! Levels and the stage that holds them
//!
//! A `Stage` owns the scene graph and everything spawned from level
//! blueprints: one `Level` per blueprint plus the obstacle and mover state
//! attached to nodes. Each level captures its authored layout once at build
//! time and can be restored to it any number of times.

use std::collections::BTreeMap;

use super::obstacle::{Mover, Obstacle};
use super::scene::{NodeId, Pose, SceneGraph};
use super::snapshot::{RestoreHook, SnapshotStore};
use super::timers::{TimerOwner, TimerWheel};
use crate::tuning::{LevelBlueprint, NodeBlueprint};

#[derive(Debug, Clone)]
pub struct Level {
    pub name: String,
    pub root: NodeId,
    pub end_marker: Option<NodeId>,
    snapshot: SnapshotStore,
    /// World pose of the root at build time
    authored_root: Pose,
}

impl Level {
    /// Capture the authored layout under `root`
    pub fn initialize(
        graph: &SceneGraph,
        name: impl Into<String>,
        root: NodeId,
        end_marker: Option<NodeId>,
    ) -> Self {
        Self {
            name: name.into(),
            root,
            end_marker,
            snapshot: SnapshotStore::capture(graph, root),
            authored_root: graph.world_pose(root),
        }
    }

    pub fn snapshot(&self) -> &SnapshotStore {
        &self.snapshot
    }

    pub fn authored_root(&self) -> Pose {
        self.authored_root
    }

    /// True for nodes inside this level (the root excluded)
    pub fn contains(&self, graph: &SceneGraph, node: NodeId) -> bool {
        graph.is_ancestor(self.root, node)
    }

    /// Children back to their authored layout; the root is left alone
    pub fn reset_level(&self, graph: &mut SceneGraph, hook: &mut dyn RestoreHook) {
        self.snapshot.restore(graph, hook);
    }

    /// Root back to its authored world pose
    pub fn reset_root_position(&self, graph: &mut SceneGraph) {
        graph.set_world_pose(self.root, self.authored_root);
    }
}

/// Resets obstacle and mover state as their nodes are restored
pub struct StageResetHook<'a> {
    pub obstacles: &'a mut BTreeMap<NodeId, Obstacle>,
    pub movers: &'a mut BTreeMap<NodeId, Mover>,
    pub timers: &'a mut TimerWheel,
}

impl RestoreHook for StageResetHook<'_> {
    fn node_restored(&mut self, node: NodeId, graph: &mut SceneGraph) {
        if let Some(obstacle) = self.obstacles.get_mut(&node) {
            obstacle.reset();
            self.timers.cancel_owner(TimerOwner::Node(node));
        }
        if let Some(mover) = self.movers.get_mut(&node) {
            if let Some(local) = graph.local(node) {
                mover.reset_motion(local.translation);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Stage {
    pub graph: SceneGraph,
    pub levels: Vec<Level>,
    pub obstacles: BTreeMap<NodeId, Obstacle>,
    pub movers: BTreeMap<NodeId, Mover>,
}

impl Stage {
    /// Spawn every blueprint and capture its snapshot
    pub fn build(blueprints: &[LevelBlueprint]) -> Self {
        let mut stage = Stage::default();
        for blueprint in blueprints {
            let root = stage
                .graph
                .spawn(blueprint.name.clone(), None, blueprint.root, true);
            let mut end_marker = None;
            for node in &blueprint.nodes {
                stage.spawn_node(node, root, &mut end_marker);
            }
            let level = Level::initialize(&stage.graph, blueprint.name.clone(), root, end_marker);
            log::debug!(
                "Built {} with {} snapshot entries",
                level.name,
                level.snapshot.len()
            );
            stage.levels.push(level);
        }
        stage
    }

    fn spawn_node(
        &mut self,
        blueprint: &NodeBlueprint,
        parent: NodeId,
        end_marker: &mut Option<NodeId>,
    ) {
        let id = self.graph.spawn(
            blueprint.name.clone(),
            Some(parent),
            blueprint.transform,
            blueprint.active,
        );
        if let Some(spec) = &blueprint.obstacle {
            self.obstacles.insert(id, Obstacle::new(id, spec.clone()));
        }
        if let Some(spec) = &blueprint.mover {
            self.movers.insert(
                id,
                Mover::new(id, spec.clone(), blueprint.transform.translation),
            );
        }
        if blueprint.end_marker {
            if end_marker.is_some() {
                log::warn!("Extra end marker '{}' ignored", blueprint.name);
            } else {
                *end_marker = Some(id);
            }
        }
        for child in &blueprint.children {
            self.spawn_node(child, id, end_marker);
        }
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn is_level_active(&self, index: usize) -> bool {
        self.levels
            .get(index)
            .is_some_and(|l| self.graph.is_active_self(l.root))
    }

    pub fn set_level_active(&mut self, index: usize, active: bool) {
        if let Some(level) = self.levels.get(index) {
            self.graph.set_active(level.root, active);
        }
    }

    pub fn deactivate_all_levels(&mut self) {
        for level in &self.levels {
            self.graph.set_active(level.root, false);
        }
    }

    pub fn active_level_count(&self) -> usize {
        (0..self.levels.len())
            .filter(|&i| self.is_level_active(i))
            .count()
    }

    /// Restore a level's children, resetting obstacles and movers on the way
    pub fn reset_level(&mut self, index: usize, timers: &mut TimerWheel) {
        let Some(level) = self.levels.get(index) else {
            return;
        };
        let mut hook = StageResetHook {
            obstacles: &mut self.obstacles,
            movers: &mut self.movers,
            timers,
        };
        level.reset_level(&mut self.graph, &mut hook);
    }

    pub fn reset_root_position(&mut self, index: usize) {
        if let Some(level) = self.levels.get(index) {
            level.reset_root_position(&mut self.graph);
        }
    }

    pub fn end_marker_y(&self, index: usize) -> Option<f32> {
        let marker = self.levels.get(index)?.end_marker?;
        Some(self.graph.world_position(marker).y)
    }

    /// Movers whose nodes are live in the given level
    pub fn update_movers(&mut self, index: usize, dt: f32) {
        let Some(level) = self.levels.get(index) else {
            return;
        };
        for mover in self.movers.values_mut() {
            if level.contains(&self.graph, mover.node)
                && self.graph.is_active_in_hierarchy(mover.node)
            {
                mover.update(dt, &mut self.graph);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::obstacle::{MoverAxis, MoverSpec, ObstacleSpec};
    use crate::sim::scene::Transform;
    use crate::tuning::demo_levels;
    use glam::Vec3;

    fn single() -> LevelBlueprint {
        LevelBlueprint {
            name: "single".into(),
            root: Transform::from_xyz(5.0, 0.0, 0.0),
            nodes: vec![
                NodeBlueprint::new("group", Transform::from_xyz(0.0, 4.0, 0.0)).with_child(
                    NodeBlueprint::new("rock", Transform::from_xyz(1.0, 0.0, 0.0))
                        .with_obstacle(ObstacleSpec::default())
                        .with_mover(MoverSpec {
                            axis: MoverAxis::Horizontal,
                            ..MoverSpec::default()
                        }),
                ),
                NodeBlueprint::end_marker("end", 12.0),
            ],
        }
    }

    #[test]
    fn test_build_registers_roles() {
        let stage = Stage::build(&[single()]);
        assert_eq!(stage.level_count(), 1);
        assert_eq!(stage.obstacles.len(), 1);
        assert_eq!(stage.movers.len(), 1);
        assert_eq!(stage.end_marker_y(0), Some(12.0));
        assert_eq!(stage.levels[0].snapshot().len(), 3);
    }

    #[test]
    fn test_reset_level_restores_obstacles() {
        let mut stage = Stage::build(&[single()]);
        let mut timers = TimerWheel::new();
        let rock = *stage.obstacles.keys().next().unwrap();

        stage.obstacles.get_mut(&rock).unwrap().take_damage(3);
        stage.graph.set_active(rock, false);
        stage.update_movers(0, 0.1);
        stage.graph.set_local_translation(rock, Vec3::new(9.0, 9.0, 0.0));

        stage.reset_level(0, &mut timers);
        assert_eq!(stage.obstacles[&rock].health(), 3);
        assert!(stage.graph.is_active_self(rock));
        assert_eq!(
            stage.graph.local(rock).unwrap().translation,
            Vec3::new(1.0, 0.0, 0.0)
        );
        assert_eq!(stage.movers[&rock].origin(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_root_reset_returns_to_authored_pose() {
        let mut stage = Stage::build(&[single()]);
        let root = stage.levels[0].root;
        stage.graph.set_world_pose(root, Pose::default());
        stage.graph.translate_world(root, Vec3::new(0.0, -7.0, 0.0));

        stage.reset_root_position(0);
        assert_eq!(stage.graph.world_position(root), Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_single_active_level_helpers() {
        let mut stage = Stage::build(&demo_levels(3));
        assert_eq!(stage.active_level_count(), 3);
        stage.deactivate_all_levels();
        stage.set_level_active(1, true);
        assert_eq!(stage.active_level_count(), 1);
        assert!(stage.is_level_active(1));
    }
}
