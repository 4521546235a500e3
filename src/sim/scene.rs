//! Minimal scene graph
//!
//! Levels are trees of nodes with local transforms and an activation flag.
//! A node is live only when it and every ancestor are active, mirroring
//! engines where a disabled parent hides its whole subtree.

use glam::{Affine3A, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Index of a node in the scene graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Local translation / rotation / scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self::from_translation(Vec3::new(x, y, z))
    }

    /// Compose `child` (expressed in this transform's space) into this space
    pub fn mul_transform(&self, child: &Transform) -> Transform {
        Transform {
            translation: self.transform_point(child.translation),
            rotation: self.rotation * child.rotation,
            scale: self.scale * child.scale,
        }
    }

    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.translation + self.rotation * (self.scale * point)
    }

    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// World position + rotation (no scale), used for anchors and root poses
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Pose {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub local: Transform,
    pub active_self: bool,
}

/// Arena of nodes; ids stay valid for the graph's lifetime
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a node, appending it to its parent's children
    pub fn spawn(
        &mut self,
        name: impl Into<String>,
        parent: Option<NodeId>,
        local: Transform,
        active: bool,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            name: name.into(),
            parent,
            children: Vec::new(),
            local,
            active_self: active,
        });
        if let Some(parent) = parent {
            if let Some(p) = self.nodes.get_mut(parent.index()) {
                p.children.push(id);
            }
        }
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub fn local(&self, id: NodeId) -> Option<Transform> {
        self.node(id).map(|n| n.local)
    }

    pub fn set_local(&mut self, id: NodeId, local: Transform) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.local = local;
                true
            }
            None => false,
        }
    }

    pub fn set_local_translation(&mut self, id: NodeId, translation: Vec3) {
        if let Some(node) = self.node_mut(id) {
            node.local.translation = translation;
        }
    }

    pub fn set_active(&mut self, id: NodeId, active: bool) {
        if let Some(node) = self.node_mut(id) {
            node.active_self = active;
        }
    }

    pub fn is_active_self(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.active_self)
    }

    /// Active flag of the node and all of its ancestors
    pub fn is_active_in_hierarchy(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            match self.node(current) {
                Some(node) if node.active_self => cursor = node.parent,
                _ => return false,
            }
        }
        true
    }

    pub fn world_transform(&self, id: NodeId) -> Transform {
        let Some(node) = self.node(id) else {
            return Transform::IDENTITY;
        };
        match node.parent {
            Some(parent) => self.world_transform(parent).mul_transform(&node.local),
            None => node.local,
        }
    }

    pub fn world_position(&self, id: NodeId) -> Vec3 {
        self.world_transform(id).translation
    }

    pub fn world_pose(&self, id: NodeId) -> Pose {
        let world = self.world_transform(id);
        Pose {
            position: world.translation,
            rotation: world.rotation,
        }
    }

    /// Place a node at a world pose, keeping its local scale
    pub fn set_world_pose(&mut self, id: NodeId, pose: Pose) {
        let Some(parent) = self.node(id).map(|n| n.parent) else {
            return;
        };
        let (translation, rotation) = match parent {
            Some(parent) => {
                let parent_world = self.world_transform(parent);
                let inverse = parent_world.to_affine().inverse();
                (
                    inverse.transform_point3(pose.position),
                    parent_world.rotation.inverse() * pose.rotation,
                )
            }
            None => (pose.position, pose.rotation),
        };
        if let Some(node) = self.node_mut(id) {
            node.local.translation = translation;
            node.local.rotation = rotation;
        }
    }

    /// Move a node by a world-space offset
    pub fn translate_world(&mut self, id: NodeId, delta: Vec3) {
        let pose = self.world_pose(id);
        self.set_world_pose(
            id,
            Pose {
                position: pose.position + delta,
                rotation: pose.rotation,
            },
        );
    }

    /// Every descendant of `root` (inactive ones included) with its depth
    ///
    /// Direct children have depth 1. Order is depth-first pre-order.
    pub fn descendants_with_depth(&self, root: NodeId) -> Vec<(NodeId, u32)> {
        let mut out = Vec::new();
        let mut stack: Vec<(NodeId, u32)> = match self.node(root) {
            Some(node) => node.children.iter().rev().map(|&c| (c, 1)).collect(),
            None => return out,
        };
        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            if let Some(node) = self.node(id) {
                stack.extend(node.children.iter().rev().map(|&c| (c, depth + 1)));
            }
        }
        out
    }

    /// True when `ancestor` is a strict ancestor of `id`
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cursor = self.node(id).and_then(|n| n.parent);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.node(current).and_then(|n| n.parent);
        }
        false
    }
}
