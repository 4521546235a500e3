//! Authored-layout snapshots
//!
//! A level captures every descendant's local transform and active flag once,
//! then restores them on every restart. Entries are kept in ascending depth
//! so a parent is always written before its children.

use glam::{Quat, Vec3};

use super::scene::{NodeId, SceneGraph, Transform};

/// Recorded authored state of one node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSnapshotEntry {
    pub node: NodeId,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub active: bool,
    /// Distance from the level root (direct children are 1)
    pub depth: u32,
}

impl LevelSnapshotEntry {
    pub fn local(&self) -> Transform {
        Transform {
            translation: self.position,
            rotation: self.rotation,
            scale: self.scale,
        }
    }
}

/// Called after each node is restored, in restore order
pub trait RestoreHook {
    fn node_restored(&mut self, node: NodeId, graph: &mut SceneGraph);
}

/// Hook that does nothing
pub struct NoHook;

impl RestoreHook for NoHook {
    fn node_restored(&mut self, _node: NodeId, _graph: &mut SceneGraph) {}
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    entries: Vec<LevelSnapshotEntry>,
}

impl SnapshotStore {
    /// Record every descendant of `root`, inactive ones included
    ///
    /// The root itself is excluded.
    pub fn capture(graph: &SceneGraph, root: NodeId) -> Self {
        let mut entries: Vec<LevelSnapshotEntry> = graph
            .descendants_with_depth(root)
            .into_iter()
            .filter_map(|(node, depth)| {
                let n = graph.node(node)?;
                Some(LevelSnapshotEntry {
                    node,
                    position: n.local.translation,
                    rotation: n.local.rotation,
                    scale: n.local.scale,
                    active: n.active_self,
                    depth,
                })
            })
            .collect();
        // Stable: siblings keep authoring order
        entries.sort_by_key(|e| e.depth);
        Self { entries }
    }

    pub fn entries(&self) -> &[LevelSnapshotEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every entry back, parents first
    ///
    /// Per entry: transform, then active flag, then the hook. Nodes that no
    /// longer exist are skipped.
    pub fn restore(&self, graph: &mut SceneGraph, hook: &mut dyn RestoreHook) {
        for entry in &self.entries {
            if !graph.set_local(entry.node, entry.local()) {
                continue;
            }
            graph.set_active(entry.node, entry.active);
            hook.node_restored(entry.node, graph);
        }
    }
}
